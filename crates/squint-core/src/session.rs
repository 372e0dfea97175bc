//! Cluster session: connection lifecycle and the foreground-facing API.
//!
//! The session lives on the foreground thread. Connecting happens on a
//! runtime task that reports back through a channel; the foreground drains
//! it with [`ClusterSession::try_recv_event`] between frames, so it never
//! blocks on the network.

use crate::error::{AuthFailure, ConnectError, SessionError};
use crate::poller::{Poller, PollerConfig};
use crate::queue::CommandQueue;
use crate::runner::{CommandRunner, Connector};
use crate::snapshot::{Snapshot, SnapshotStore};
use squint_slurm::commands::{self, JobAge};
use squint_slurm::{ClusterConfig, Job, parse_config, parse_partitions};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Password login details collected by the foreground.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Overrides the user from the destination string when set.
    pub username: Option<String>,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connecting,
    Ready,
    NeedsPassword,
    WrongPassword,
    /// Terminal; the message is shown to the user before exit.
    Failed(String),
}

impl SessionState {
    /// Whether the foreground should ask for credentials.
    pub fn wants_credentials(&self) -> bool {
        matches!(self, Self::NeedsPassword | Self::WrongPassword)
    }
}

/// Facts resolved once per ready session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterInfo {
    pub current_user: String,
    pub config: ClusterConfig,
    /// Partitions visible to the current user.
    pub my_partitions: Vec<String>,
    pub all_partitions: Vec<String>,
}

impl ClusterInfo {
    pub fn cluster_name(&self) -> Option<&str> {
        self.config.cluster_name()
    }
}

/// Lifecycle notifications delivered to the foreground.
#[derive(Debug)]
pub enum SessionEvent {
    NeedsPassword,
    WrongPassword,
    Ready,
    Failed(ConnectError),
}

impl SessionEvent {
    /// Human-readable status line for the event.
    pub fn message(&self) -> String {
        match self {
            Self::NeedsPassword => AuthFailure::NeedsPassword.to_string(),
            Self::WrongPassword => AuthFailure::WrongPassword.to_string(),
            Self::Ready => "connection established".to_string(),
            Self::Failed(e) => e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub poller: PollerConfig,
}

impl SessionConfig {
    pub fn with_refresh_interval(interval: Duration) -> Self {
        Self {
            poller: PollerConfig {
                interval,
                ..Default::default()
            },
        }
    }
}

/// Worker-to-foreground message; carries the pieces a ready session needs.
enum Outcome {
    NeedsPassword,
    WrongPassword,
    Ready {
        info: ClusterInfo,
        queue: CommandQueue,
        poller: JoinHandle<()>,
    },
    Failed(ConnectError),
}

pub struct ClusterSession {
    runtime: Handle,
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    state: SessionState,
    store: Arc<SnapshotStore>,
    info: Option<ClusterInfo>,
    queue: Option<CommandQueue>,
    worker: Option<JoinHandle<()>>,
    poller: Option<JoinHandle<()>>,
    outcome_tx: UnboundedSender<Outcome>,
    outcome_rx: UnboundedReceiver<Outcome>,
    /// Events already applied to `state` but not yet handed to the caller.
    pending_events: VecDeque<SessionEvent>,
}

impl ClusterSession {
    /// `runtime` must outlive the session; connection work runs on it.
    pub fn new(runtime: Handle, connector: Arc<dyn Connector>, config: SessionConfig) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            connector,
            config,
            state: SessionState::Unconnected,
            store: Arc::new(SnapshotStore::new()),
            info: None,
            queue: None,
            worker: None,
            poller: None,
            outcome_tx,
            outcome_rx,
            pending_events: VecDeque::new(),
        }
    }

    /// Start (or retry) connecting in the background.
    ///
    /// A no-op once the session is ready. A previous attempt still in flight
    /// is waited for first so that at most one worker exists.
    pub fn connect(&mut self, credentials: Option<Credentials>) {
        if let Some(worker) = self.worker.take() {
            if !worker.is_finished() {
                tracing::debug!("Waiting for previous connection attempt");
            }
            if let Err(e) = self.runtime.block_on(worker) {
                tracing::warn!("Previous connection attempt ended abnormally: {}", e);
            }
        }
        // The joined worker may have finished connecting already.
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            let event = self.apply(outcome);
            self.pending_events.push_back(event);
        }
        if self.state == SessionState::Ready {
            return;
        }

        self.state = SessionState::Connecting;
        let connector = Arc::clone(&self.connector);
        let store = Arc::clone(&self.store);
        let config = self.config.poller.clone();
        let tx = self.outcome_tx.clone();
        self.worker = Some(self.runtime.spawn(async move {
            let outcome = establish(connector, credentials, store, config).await;
            // The receiver only disappears with the session itself.
            let _ = tx.send(outcome);
        }));
    }

    /// Apply the next pending connection outcome, if any.
    pub fn try_recv_event(&mut self) -> Option<SessionEvent> {
        if let Some(event) = self.pending_events.pop_front() {
            return Some(event);
        }
        let outcome = self.outcome_rx.try_recv().ok()?;
        Some(self.apply(outcome))
    }

    /// Block up to `timeout` for the next connection outcome.
    pub fn wait_event(&mut self, timeout: Duration) -> Option<SessionEvent> {
        if let Some(event) = self.pending_events.pop_front() {
            return Some(event);
        }
        let rx = &mut self.outcome_rx;
        let outcome = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, rx.recv()).await })
            .ok()
            .flatten()?;
        Some(self.apply(outcome))
    }

    fn apply(&mut self, outcome: Outcome) -> SessionEvent {
        match outcome {
            Outcome::NeedsPassword => {
                self.state = SessionState::NeedsPassword;
                SessionEvent::NeedsPassword
            }
            Outcome::WrongPassword => {
                self.state = SessionState::WrongPassword;
                SessionEvent::WrongPassword
            }
            Outcome::Ready {
                info,
                queue,
                poller,
            } => {
                tracing::info!(
                    "Session ready as {} on {}",
                    info.current_user,
                    info.cluster_name().unwrap_or("unnamed cluster")
                );
                self.state = SessionState::Ready;
                self.info = Some(info);
                self.queue = Some(queue);
                self.poller = Some(poller);
                SessionEvent::Ready
            }
            Outcome::Failed(e) => {
                tracing::error!("Connection failed: {}", e);
                self.state = SessionState::Failed(e.to_string());
                SessionEvent::Failed(e)
            }
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn info(&self) -> Option<&ClusterInfo> {
        self.info.as_ref()
    }

    pub fn remote_target(&self) -> Option<String> {
        self.connector.remote_target()
    }

    /// Latest job list plus poll health. Empty until the first refresh.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = self.store.read();
        snapshot.poller_stopped = self.poller.as_ref().is_some_and(|p| p.is_finished());
        snapshot
    }

    pub fn get_jobs(&self) -> Result<Arc<Vec<Job>>, SessionError> {
        self.require_ready()?;
        Ok(self.store.jobs())
    }

    fn require_ready(&self) -> Result<(&CommandQueue, &ClusterInfo), SessionError> {
        match (&self.queue, &self.info) {
            (Some(queue), Some(info)) if self.is_ready() => Ok((queue, info)),
            _ => Err(SessionError::NotReady),
        }
    }

    /// Queue an arbitrary command line for the poller.
    pub fn enqueue(&self, command: impl Into<String>) -> Result<u64, SessionError> {
        let (queue, _) = self.require_ready()?;
        queue.enqueue(command)
    }

    pub fn cancel_jobs<S: AsRef<str>>(&self, job_ids: &[S]) -> Result<u64, SessionError> {
        self.require_ready()?;
        let command = commands::cancel_jobs(job_ids).ok_or(SessionError::EmptySelection)?;
        self.enqueue(command)
    }

    pub fn cancel_my_jobs(&self) -> Result<u64, SessionError> {
        let (_, info) = self.require_ready()?;
        self.enqueue(commands::cancel_user_jobs(&info.current_user))
    }

    pub fn cancel_my_newest_job(&self) -> Result<u64, SessionError> {
        let (_, info) = self.require_ready()?;
        self.enqueue(commands::cancel_user_job_by_age(&info.current_user, JobAge::Newest))
    }

    pub fn cancel_my_oldest_job(&self) -> Result<u64, SessionError> {
        let (_, info) = self.require_ready()?;
        self.enqueue(commands::cancel_user_job_by_age(&info.current_user, JobAge::Oldest))
    }

    /// Change the nice value of a pending job.
    pub fn set_nice(&self, job: &Job, nice: i32) -> Result<u64, SessionError> {
        self.require_ready()?;
        if !job.is_pending() {
            return Err(invalid(job, "nice can only be changed while pending"));
        }
        self.enqueue(commands::set_nice(&job.job_id, nice))
    }

    /// Change the concurrency limit of a pending array job.
    pub fn set_array_throttle(&self, job: &Job, throttle: u32) -> Result<u64, SessionError> {
        self.require_ready()?;
        if !(job.is_pending() && job.is_array_job) {
            return Err(invalid(job, "throttle applies to pending array jobs only"));
        }
        if throttle == 0 {
            return Err(invalid(job, "throttle must be at least 1"));
        }
        self.enqueue(commands::set_array_throttle(&job.array_base_id, throttle))
    }

    /// Argv for an interactive attach, run by the foreground in its terminal.
    pub fn attach_command(&self, job: &Job) -> Result<Vec<String>, SessionError> {
        self.require_ready()?;
        if !job.is_running() {
            return Err(invalid(job, "only running jobs can be attached to"));
        }
        Ok(commands::attach_argv(
            &job.job_id,
            self.connector.remote_target().as_deref(),
        ))
    }
}

impl Drop for ClusterSession {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

fn invalid(job: &Job, reason: &str) -> SessionError {
    SessionError::InvalidTarget {
        job_id: job.job_id.clone(),
        reason: reason.to_string(),
    }
}

/// Connect, resolve cluster facts and start the poller.
async fn establish(
    connector: Arc<dyn Connector>,
    credentials: Option<Credentials>,
    store: Arc<SnapshotStore>,
    config: PollerConfig,
) -> Outcome {
    let runner = match connector.connect(credentials).await {
        Ok(runner) => runner,
        Err(ConnectError::Auth(AuthFailure::NeedsPassword)) => return Outcome::NeedsPassword,
        Err(ConnectError::Auth(AuthFailure::WrongPassword)) => return Outcome::WrongPassword,
        Err(e) => return Outcome::Failed(e),
    };

    let info = match resolve_cluster_info(runner.as_ref()).await {
        Ok(info) => info,
        Err(e) => return Outcome::Failed(e),
    };

    let (queue, backlog) = CommandQueue::channel();
    let poller = Poller::new(runner, store, backlog, config).start();
    Outcome::Ready {
        info,
        queue,
        poller,
    }
}

async fn resolve_cluster_info(runner: &dyn CommandRunner) -> Result<ClusterInfo, ConnectError> {
    let current_user = runner
        .run(commands::WHOAMI)
        .await?
        .into_iter()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|user| !user.is_empty())
        .ok_or_else(|| ConnectError::Transport("whoami printed nothing".into()))?;

    let config = parse_config(&runner.run(commands::SHOW_CONFIG).await?);
    let my_partitions = parse_partitions(&runner.run(commands::MY_PARTITIONS).await?);
    let all_partitions = parse_partitions(&runner.run(commands::ALL_PARTITIONS).await?);

    Ok(ClusterInfo {
        current_user,
        config,
        my_partitions,
        all_partitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::LocalConnector;
    use crate::testing::{FakeConnector, FakeRunner, RUNNING_LINE};
    use std::time::Instant;
    use tokio::runtime::Runtime;

    const WAIT: Duration = Duration::from_secs(5);

    fn session(rt: &Runtime, connector: impl Connector + 'static) -> ClusterSession {
        ClusterSession::new(
            rt.handle().clone(),
            Arc::new(connector),
            SessionConfig::with_refresh_interval(Duration::from_millis(20)),
        )
    }

    fn password(p: &str) -> Option<Credentials> {
        Some(Credentials {
            username: None,
            password: p.to_string(),
        })
    }

    /// Poll the snapshot until `check` holds or the deadline passes.
    fn wait_until(session: &ClusterSession, check: impl Fn(&Snapshot) -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if check(&session.snapshot()) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn ready_session(rt: &Runtime, runner: &FakeRunner) -> ClusterSession {
        let mut session = session(
            rt,
            FakeConnector {
                runner: runner.clone(),
                password: None,
            },
        );
        session.connect(None);
        assert!(matches!(session.wait_event(WAIT), Some(SessionEvent::Ready)));
        session
    }

    #[test]
    fn test_missing_tooling_fails_without_polling() {
        let rt = Runtime::new().unwrap();
        let mut session = session(&rt, LocalConnector::with_probe_program("squint_missing_12345"));
        session.connect(None);

        let event = session.wait_event(WAIT);
        assert!(matches!(
            event,
            Some(SessionEvent::Failed(ConnectError::Configuration(_)))
        ));
        assert!(matches!(session.state(), SessionState::Failed(_)));
        assert_eq!(session.snapshot().generation, 0);
        assert_eq!(session.cancel_my_jobs(), Err(SessionError::NotReady));
    }

    #[test]
    fn test_password_flow_then_first_refresh() {
        let rt = Runtime::new().unwrap();
        let runner = FakeRunner::with_listing(&[RUNNING_LINE]);
        let mut session = session(
            &rt,
            FakeConnector {
                runner: runner.clone(),
                password: Some("hunter2".into()),
            },
        );

        session.connect(None);
        assert!(matches!(session.wait_event(WAIT), Some(SessionEvent::NeedsPassword)));
        assert!(session.state().wants_credentials());
        assert_eq!(session.enqueue("scancel 1"), Err(SessionError::NotReady));

        session.connect(password("wrong"));
        assert!(matches!(session.wait_event(WAIT), Some(SessionEvent::WrongPassword)));
        assert_eq!(session.state(), &SessionState::WrongPassword);

        session.connect(password("hunter2"));
        assert!(matches!(session.wait_event(WAIT), Some(SessionEvent::Ready)));
        assert!(session.is_ready());

        let info = session.info().unwrap();
        assert_eq!(info.current_user, "alice");
        assert_eq!(info.cluster_name(), Some("testcluster"));
        assert_eq!(info.my_partitions, vec!["short", "gpu"]);
        assert_eq!(info.all_partitions.len(), 3);

        assert!(wait_until(&session, |s| s.generation >= 1));
        assert_eq!(session.get_jobs().unwrap()[0].job_id, "1234");
    }

    #[test]
    fn test_connect_is_idempotent_when_ready() {
        let rt = Runtime::new().unwrap();
        let runner = FakeRunner::default();
        let mut session = ready_session(&rt, &runner);
        session.connect(None);
        assert!(session.try_recv_event().is_none());
        assert!(session.is_ready());
    }

    #[test]
    fn test_reconnect_before_draining_ready_keeps_one_connection() {
        let rt = Runtime::new().unwrap();
        let runner = FakeRunner::with_listing(&[RUNNING_LINE]);
        let mut session = session(
            &rt,
            FakeConnector {
                runner: runner.clone(),
                password: None,
            },
        );

        session.connect(None);
        // Let the worker finish without draining its outcome.
        std::thread::sleep(Duration::from_millis(200));
        session.connect(None);

        assert!(matches!(session.try_recv_event(), Some(SessionEvent::Ready)));
        assert!(session.try_recv_event().is_none());
        assert!(session.is_ready());

        std::thread::sleep(Duration::from_millis(100));
        let whoami_runs = runner
            .executed()
            .iter()
            .filter(|c| c.as_str() == commands::WHOAMI)
            .count();
        assert_eq!(whoami_runs, 1);
    }

    #[test]
    fn test_crashed_poller_is_reported() {
        let rt = Runtime::new().unwrap();
        let runner = FakeRunner::with_listing(&[RUNNING_LINE]);
        let session = ready_session(&rt, &runner);
        assert!(wait_until(&session, |s| s.generation >= 1));
        assert!(!session.snapshot().poller_stopped);

        runner.panic_on_listing();
        assert!(wait_until(&session, |s| s.poller_stopped));
        let snapshot = session.snapshot();
        assert!(snapshot.is_stale());
        assert_eq!(snapshot.jobs.len(), 1);
    }

    #[test]
    fn test_cancel_reaches_cluster_once() {
        let rt = Runtime::new().unwrap();
        let runner = FakeRunner::with_listing(&[RUNNING_LINE]);
        let session = ready_session(&rt, &runner);

        session.cancel_jobs(&["1234"]).unwrap();
        assert!(wait_until(&session, |_| !runner.mutations().is_empty()));
        let before = session.snapshot().generation;
        assert!(wait_until(&session, |s| s.generation >= before + 2));
        assert_eq!(runner.mutations(), vec!["scancel 1234"]);
    }

    #[test]
    fn test_user_scoped_commands() {
        let rt = Runtime::new().unwrap();
        let runner = FakeRunner::default();
        let session = ready_session(&rt, &runner);

        session.cancel_my_jobs().unwrap();
        session.cancel_my_newest_job().unwrap();
        session.cancel_my_oldest_job().unwrap();
        assert!(wait_until(&session, |_| runner.mutations().len() == 3));
        assert_eq!(
            runner.mutations(),
            vec![
                "scancel -u alice".to_string(),
                commands::cancel_user_job_by_age("alice", JobAge::Newest),
                commands::cancel_user_job_by_age("alice", JobAge::Oldest),
            ]
        );
    }

    #[test]
    fn test_empty_selection_rejected() {
        let rt = Runtime::new().unwrap();
        let session = ready_session(&rt, &FakeRunner::default());
        let none: [&str; 0] = [];
        assert_eq!(session.cancel_jobs(&none), Err(SessionError::EmptySelection));
    }

    #[test]
    fn test_job_targeted_validation() {
        let rt = Runtime::new().unwrap();
        let session = ready_session(&rt, &FakeRunner::default());

        let running = Job {
            job_id: "5".into(),
            state: "RUNNING".into(),
            ..Default::default()
        };
        let pending_array = Job {
            job_id: "7".into(),
            array_base_id: "6".into(),
            array_task_index: "1-4".into(),
            is_array_job: true,
            state: "PENDING".into(),
            ..Default::default()
        };

        assert!(matches!(
            session.set_nice(&running, 10),
            Err(SessionError::InvalidTarget { .. })
        ));
        assert!(session.set_nice(&pending_array, 10).is_ok());
        assert!(session.set_array_throttle(&pending_array, 0).is_err());
        assert!(session.set_array_throttle(&pending_array, 2).is_ok());
        assert!(session.attach_command(&pending_array).is_err());
        assert_eq!(
            session.attach_command(&running).unwrap(),
            vec!["ssh", "-t", "alice@hpc", "sattach 5.0"]
        );
    }
}

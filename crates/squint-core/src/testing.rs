//! Scripted runner and connector used by the core tests.

use crate::error::{AuthFailure, ConnectError, RunError};
use crate::runner::{CommandRunner, Connector};
use crate::session::Credentials;
use async_trait::async_trait;
use squint_slurm::commands::{ALL_PARTITIONS, MY_PARTITIONS, SHOW_CONFIG, WHOAMI};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) const RUNNING_LINE: &str =
    "1234|1234|1234|N/A|4|train|gpu|None|alice|0|RUNNING|1:02:03|gres/gpu:1|gpu01";
pub(crate) const PENDING_LINE: &str =
    "1300|1300_[5-9%2]|1300|5-9%2|1|sweep|short|Priority|alice|0|PENDING|0:00|N/A|";

#[derive(Default)]
struct Script {
    executed: Mutex<Vec<String>>,
    listing: Mutex<Vec<String>>,
    fail_listing: AtomicBool,
    panic_listing: AtomicBool,
    transport_failures: Mutex<HashMap<String, u32>>,
    exit_failures: Mutex<HashSet<String>>,
}

/// Cloneable handle; clones share the same script and call log.
#[derive(Clone, Default)]
pub(crate) struct FakeRunner {
    script: Arc<Script>,
}

impl FakeRunner {
    pub(crate) fn with_listing(lines: &[&str]) -> Self {
        let runner = Self::default();
        runner.set_listing(lines);
        runner
    }

    pub(crate) fn set_listing(&self, lines: &[&str]) {
        *self.script.listing.lock().unwrap() = lines.iter().map(|l| l.to_string()).collect();
    }

    pub(crate) fn fail_listing(&self, fail: bool) {
        self.script.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Listings panic from now on, taking the poller task down.
    pub(crate) fn panic_on_listing(&self) {
        self.script.panic_listing.store(true, Ordering::SeqCst);
    }

    /// The next `times` runs of `command` fail with a transport error.
    pub(crate) fn fail_transport(&self, command: &str, times: u32) {
        self.script
            .transport_failures
            .lock()
            .unwrap()
            .insert(command.to_string(), times);
    }

    pub(crate) fn fail_exit(&self, command: &str) {
        self.script.exit_failures.lock().unwrap().insert(command.to_string());
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.script.executed.lock().unwrap().clone()
    }

    /// Executed commands other than queue listings and cluster fact queries.
    pub(crate) fn mutations(&self) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|c| !c.starts_with("squeue --noheader --all"))
            .filter(|c| ![WHOAMI, SHOW_CONFIG, MY_PARTITIONS, ALL_PARTITIONS].contains(&c.as_str()))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &str) -> Result<Vec<String>, RunError> {
        self.script.executed.lock().unwrap().push(command.to_string());

        if let Some(left) = self.script.transport_failures.lock().unwrap().get_mut(command) {
            if *left > 0 {
                *left -= 1;
                return Err(RunError::Transport("connection reset".into()));
            }
        }
        if self.script.exit_failures.lock().unwrap().contains(command) {
            return Err(RunError::Exit {
                command: command.to_string(),
                status: 1,
                stderr: "Invalid job id specified".into(),
            });
        }

        let lines: Vec<&str> = match command {
            c if c.starts_with("squeue --noheader --all") => {
                if self.script.panic_listing.load(Ordering::SeqCst) {
                    panic!("listing crashed");
                }
                if self.script.fail_listing.load(Ordering::SeqCst) {
                    return Err(RunError::Transport("connection reset".into()));
                }
                return Ok(self.script.listing.lock().unwrap().clone());
            }
            WHOAMI => vec!["alice"],
            SHOW_CONFIG => vec![
                "Configuration data as of 2024-05-01T10:00:00",
                "ClusterName             = testcluster",
                "SlurmctldPort           = 6817",
            ],
            MY_PARTITIONS => vec!["short", "gpu"],
            ALL_PARTITIONS => vec!["short", "gpu", "debug"],
            _ => vec![],
        };
        Ok(lines.into_iter().map(str::to_string).collect())
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

/// Accepts only `password` when one is configured.
pub(crate) struct FakeConnector {
    pub(crate) runner: FakeRunner,
    pub(crate) password: Option<String>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        credentials: Option<Credentials>,
    ) -> Result<Box<dyn CommandRunner>, ConnectError> {
        if let Some(expected) = &self.password {
            match credentials {
                None => return Err(AuthFailure::NeedsPassword.into()),
                Some(c) if &c.password != expected => {
                    return Err(AuthFailure::WrongPassword.into());
                }
                Some(_) => {}
            }
        }
        Ok(Box::new(self.runner.clone()))
    }

    fn remote_target(&self) -> Option<String> {
        Some("alice@hpc".to_string())
    }
}

//! Shared, most-recent job list.
//!
//! Written only by the poller, read by the foreground on every frame. A read
//! clones an `Arc`, so the foreground never waits on a refresh in progress.

use chrono::{DateTime, Local};
use squint_slurm::Job;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Outcome message for a command the poller applied, surfaced in the footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Increases with every notice so the UI can tell new ones apart.
    pub seq: u64,
    pub text: String,
    pub is_error: bool,
}

/// Point-in-time view of the queue plus poll health.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub jobs: Arc<Vec<Job>>,
    /// Number of successful refreshes so far; 0 until the first one lands.
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Local>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_notice: Option<Notice>,
    /// The poller task ended while the session was still live.
    pub poller_stopped: bool,
}

impl Snapshot {
    pub fn is_stale(&self) -> bool {
        self.consecutive_failures > 0 || self.poller_stopped
    }
}

#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: Mutex<Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a freshly parsed job list in one step.
    pub fn replace(&self, jobs: Vec<Job>) {
        let jobs = Arc::new(jobs);
        let mut snapshot = self.lock();
        snapshot.jobs = jobs;
        snapshot.generation += 1;
        snapshot.refreshed_at = Some(Local::now());
        snapshot.consecutive_failures = 0;
        snapshot.last_error = None;
    }

    /// Record a failed refresh; the previous job list stays in place.
    pub fn record_failure(&self, error: impl Into<String>) {
        let mut snapshot = self.lock();
        snapshot.consecutive_failures = snapshot.consecutive_failures.saturating_add(1);
        snapshot.last_error = Some(error.into());
    }

    pub fn post_notice(&self, text: impl Into<String>, is_error: bool) {
        let mut snapshot = self.lock();
        let seq = snapshot.last_notice.as_ref().map_or(1, |n| n.seq + 1);
        snapshot.last_notice = Some(Notice {
            seq,
            text: text.into(),
            is_error,
        });
    }

    pub fn read(&self) -> Snapshot {
        self.lock().clone()
    }

    pub fn jobs(&self) -> Arc<Vec<Job>> {
        Arc::clone(&self.lock().jobs)
    }
}

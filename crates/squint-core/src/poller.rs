//! Background worker: refresh the job list, then apply queued commands.

use crate::queue::CommandBacklog;
use crate::runner::CommandRunner;
use crate::snapshot::SnapshotStore;
use squint_slurm::{FieldOrder, parse_squeue_output};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Sleep between the end of one tick and the start of the next.
    pub interval: Duration,
    /// Transport failures tolerated per command before it is dropped.
    pub command_attempts: u32,
    pub field_order: FieldOrder,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            command_attempts: 3,
            field_order: FieldOrder::standard(),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub refreshed: bool,
    pub commands_applied: usize,
    pub commands_failed: usize,
    /// Commands left waiting for the next tick.
    pub commands_deferred: usize,
}

/// Sole user of the runner once a session is ready, so listings and
/// mutations never overlap on the transport.
pub struct Poller {
    runner: Box<dyn CommandRunner>,
    store: Arc<SnapshotStore>,
    backlog: CommandBacklog,
    config: PollerConfig,
    listing: String,
}

impl Poller {
    pub fn new(
        runner: Box<dyn CommandRunner>,
        store: Arc<SnapshotStore>,
        backlog: CommandBacklog,
        config: PollerConfig,
    ) -> Self {
        let listing = config.field_order.listing_command();
        Self {
            runner,
            store,
            backlog,
            config,
            listing,
        }
    }

    /// Start the poller on the current runtime.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Tick until every command producer is gone.
    async fn run(mut self) {
        tracing::info!(
            "Poller started on {} (every {:?})",
            self.runner.describe(),
            self.config.interval
        );
        loop {
            self.tick().await;
            if self.backlog.is_finished() {
                break;
            }
            tokio::time::sleep(self.config.interval).await;
        }
        tracing::info!("Poller stopped");
    }

    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            refreshed: self.refresh().await,
            ..Default::default()
        };
        self.apply_commands(&mut report).await;
        report
    }

    async fn refresh(&self) -> bool {
        match self.runner.run(&self.listing).await {
            Ok(lines) => {
                let jobs = parse_squeue_output(&self.config.field_order, &lines);
                tracing::debug!("Refreshed {} jobs", jobs.len());
                self.store.replace(jobs);
                true
            }
            Err(e) => {
                tracing::error!("Error polling squeue: {}", e);
                self.store.record_failure(e.to_string());
                false
            }
        }
    }

    /// Run queued commands in FIFO order.
    ///
    /// A transport failure stops the drain and leaves the command at the head
    /// for the next tick, until its retry budget runs out.
    async fn apply_commands(&mut self, report: &mut TickReport) {
        self.backlog.collect();

        while let Some(mut command) = self.backlog.pop_front() {
            match self.runner.run(&command.text).await {
                Ok(_) => {
                    tracing::info!("Applied command #{}: {}", command.seq, command.text);
                    report.commands_applied += 1;
                }
                Err(e) if e.is_transport() => {
                    command.attempts += 1;
                    if command.attempts >= self.config.command_attempts {
                        tracing::error!(
                            "Giving up on command #{} after {} attempts: {}",
                            command.seq,
                            command.attempts,
                            e
                        );
                        self.store
                            .post_notice(format!("Gave up on `{}`: {}", command.text, e), true);
                        report.commands_failed += 1;
                        continue;
                    }
                    tracing::warn!(
                        "Command #{} failed (attempt {}), will retry: {}",
                        command.seq,
                        command.attempts,
                        e
                    );
                    self.backlog.push_front(command);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Command #{} rejected: {}", command.seq, e);
                    self.store.post_notice(e.to_string(), true);
                    report.commands_failed += 1;
                }
            }
        }

        report.commands_deferred = self.backlog.len();
    }
}

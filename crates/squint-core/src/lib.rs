//! Connection and polling core for squint.
//!
//! A [`ClusterSession`] owns the connection lifecycle. Once it is ready, a
//! single [`Poller`] task refreshes the job list into a [`SnapshotStore`] and
//! applies queued mutation commands, all over the one transport handle.

pub mod error;
pub mod poller;
pub mod queue;
pub mod runner;
pub mod session;
pub mod snapshot;
pub mod ssh;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AuthFailure, ConnectError, RunError, SessionError};
pub use poller::{Poller, PollerConfig, TickReport};
pub use queue::{CommandBacklog, CommandQueue, OutboundCommand};
pub use runner::{CommandRunner, Connector, LocalConnector, LocalRunner};
pub use session::{
    ClusterInfo, ClusterSession, Credentials, SessionConfig, SessionEvent, SessionState,
};
pub use snapshot::{Notice, Snapshot, SnapshotStore};
pub use ssh::{SshConnector, SshSettings, SshTarget};

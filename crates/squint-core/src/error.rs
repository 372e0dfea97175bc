//! Error taxonomy shared by the runner, session and poller.

use thiserror::Error;

/// Recoverable authentication outcomes.
///
/// The display strings double as the sentinel messages the foreground keys
/// its retry UI on.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No key or agent identity was accepted and no password was supplied.
    #[error("need password")]
    NeedsPassword,
    /// A password was supplied and rejected.
    #[error("wrong password")]
    WrongPassword,
}

/// Failure of a single command execution.
#[derive(Error, Debug)]
pub enum RunError {
    /// The connection is dropped or the process could not be started.
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("authentication failure: {0}")]
    Auth(AuthFailure),
    /// The command ran and exited non-zero.
    #[error("`{command}` exited with status {status}: {stderr}")]
    Exit {
        command: String,
        status: i32,
        stderr: String,
    },
}

impl RunError {
    /// Whether a retry on a later tick could succeed.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Auth(_))
    }
}

/// Failure to establish a session.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Required tooling is missing; fatal, not retried.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Auth(#[from] AuthFailure),
    /// Anything else on the way to a ready session; fatal.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<RunError> for ConnectError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Auth(failure) => Self::Auth(failure),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Errors from the foreground-facing session API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("not connected to a cluster yet")]
    NotReady,
    #[error("no jobs selected")]
    EmptySelection,
    #[error("job {job_id}: {reason}")]
    InvalidTarget { job_id: String, reason: String },
    #[error("the polling worker has stopped")]
    QueueClosed,
}

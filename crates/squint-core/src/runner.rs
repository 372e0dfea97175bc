//! Command Runner: executes a command line and returns its stdout lines.

use crate::error::{ConnectError, RunError};
use crate::session::Credentials;
use async_trait::async_trait;
use squint_parsers::{CommandError, output_lines, probe, run_shell};
use squint_slurm::commands::PROBE_PROGRAM;

/// Transport primitive; no interpretation of the output happens here.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<Vec<String>, RunError>;

    /// Short label for logs ("local", "bob@hpc:22").
    fn describe(&self) -> String;
}

/// Establishes a runner for one cluster.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        credentials: Option<Credentials>,
    ) -> Result<Box<dyn CommandRunner>, ConnectError>;

    /// Remote destination as the user typed it; None for the local scheduler.
    fn remote_target(&self) -> Option<String>;
}

/// Runs commands through the local shell.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner;

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, command: &str) -> Result<Vec<String>, RunError> {
        match run_shell(command).await {
            Ok(stdout) => Ok(output_lines(&stdout)),
            Err(CommandError::Execution { error, .. }) => Err(RunError::Transport(error)),
            Err(CommandError::Failed {
                command,
                status,
                stderr,
            }) => Err(RunError::Exit {
                command,
                status,
                stderr,
            }),
        }
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}

/// Connects to the scheduler installed on this machine.
#[derive(Debug, Clone)]
pub struct LocalConnector {
    probe_program: String,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self {
            probe_program: PROBE_PROGRAM.to_string(),
        }
    }

    /// Use a different binary to detect the scheduler installation.
    pub fn with_probe_program(program: impl Into<String>) -> Self {
        Self {
            probe_program: program.into(),
        }
    }
}

impl Default for LocalConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(
        &self,
        _credentials: Option<Credentials>,
    ) -> Result<Box<dyn CommandRunner>, ConnectError> {
        if !probe(&self.probe_program, "--version").await {
            return Err(ConnectError::Configuration(format!(
                "Slurm binaries not found ({} is not runnable)",
                self.probe_program
            )));
        }
        tracing::info!("Using local scheduler via {}", self.probe_program);
        Ok(Box::new(LocalRunner))
    }

    fn remote_target(&self) -> Option<String> {
        None
    }
}

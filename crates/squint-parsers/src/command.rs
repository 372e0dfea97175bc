//! Command execution utilities for scheduler queries.

use thiserror::Error;
use tokio::process::Command;

/// Error type for command execution.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to execute {command}: {error}")]
    Execution { command: String, error: String },
    #[error("Command {command} exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },
}

/// Execute a command and return stdout as a string.
///
/// This is a convenience wrapper that handles common error cases
/// and UTF-8 conversion for scheduler command output.
pub async fn run_command(cmd: &mut Command, name: &str) -> Result<String, CommandError> {
    let output = cmd.output().await.map_err(|e| CommandError::Execution {
        command: name.to_string(),
        error: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CommandError::Failed {
            command: name.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a full command line through `sh -c`.
///
/// Outbound commands may be pipelines (`squeue ... | head -n 1 | xargs scancel`),
/// so they always go through a shell, exactly as they would on a remote host.
pub async fn run_shell(command_line: &str) -> Result<String, CommandError> {
    tracing::debug!("running locally: {}", command_line);
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command_line).kill_on_drop(true);
    run_command(&mut cmd, command_line).await
}

/// Check whether `program` can be spawned and exits successfully with `arg`.
pub async fn probe(program: &str, arg: &str) -> bool {
    Command::new(program)
        .arg(arg)
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Split captured stdout into owned lines, skipping blank ones.
pub fn output_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

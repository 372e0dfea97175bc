//! Remote transport over a single authenticated SSH connection.

use crate::error::{AuthFailure, ConnectError, RunError};
use crate::runner::{CommandRunner, Connector};
use crate::session::Credentials;
use async_trait::async_trait;
use russh::ChannelMsg;
use russh::client::{AuthResult, Config, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use russh::keys::known_hosts::learn_known_hosts;
use squint_parsers::output_lines;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Identity files tried, in order, before falling back to a password.
const DEFAULT_IDENTITIES: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

/// `[user@]host[:port]` as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: Option<String>,
    pub host: String,
    pub port: u16,
}

impl SshTarget {
    pub fn parse(input: &str) -> Result<Self, ConnectError> {
        let raw = input.trim();
        let invalid = || ConnectError::Configuration(format!("invalid ssh destination: {:?}", input));

        let (user, rest) = match raw.rsplit_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
            Some(_) => return Err(invalid()),
            None => (None, raw),
        };

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, tail) = bracketed.split_once(']').ok_or_else(invalid)?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p.parse().map_err(|_| invalid())?,
                None if tail.is_empty() => 22,
                None => return Err(invalid()),
            };
            (host, port)
        } else {
            match rest.split_once(':') {
                Some((host, p)) => (host, p.parse().map_err(|_| invalid())?),
                None => (rest, 22),
            }
        };

        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(invalid());
        }

        Ok(Self {
            user,
            host: host.to_string(),
            port,
        })
    }

    /// Destination argument for the `ssh` binary; non-default ports use the
    /// `ssh://` form.
    pub fn destination(&self) -> String {
        let user = self.user.as_ref().map(|u| format!("{}@", u)).unwrap_or_default();
        if self.port == 22 {
            return format!("{}{}", user, self.host);
        }
        if self.host.contains(':') {
            format!("ssh://{}[{}]:{}", user, self.host, self.port)
        } else {
            format!("ssh://{}{}:{}", user, self.host, self.port)
        }
    }
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user {
            Some(user) => write!(f, "{}@{}:{}", user, self.host, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

/// Timeouts and keepalive for the SSH transport.
#[derive(Debug, Clone)]
pub struct SshSettings {
    pub connect_timeout: Duration,
    pub auth_timeout: Duration,
    pub keepalive_interval: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            auth_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(15),
        }
    }
}

#[derive(Error, Debug)]
pub enum SshError {
    #[error(transparent)]
    Protocol(#[from] russh::Error),
    #[error("host key for {host}:{port} rejected: {reason}")]
    HostKey {
        host: String,
        port: u16,
        reason: String,
    },
}

#[derive(Debug, Clone)]
struct ClientHandler {
    host: String,
    port: u16,
}

impl russh::client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => {
                tracing::info!(
                    "Host key for {}:{} not in known_hosts; learning it",
                    self.host,
                    self.port
                );
                if let Err(e) = learn_known_hosts(&self.host, self.port, server_public_key) {
                    tracing::warn!("Could not record host key for {}: {}", self.host, e);
                }
                Ok(true)
            }
            Err(e) => Err(SshError::HostKey {
                host: self.host.clone(),
                port: self.port,
                reason: e.to_string(),
            }),
        }
    }
}

fn transport<E: fmt::Display>(err: E) -> ConnectError {
    ConnectError::Transport(err.to_string())
}

fn default_username() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}

fn default_identity_files() -> Vec<PathBuf> {
    let Some(home) = std::env::var_os("HOME") else {
        return Vec::new();
    };
    let ssh_dir = PathBuf::from(home).join(".ssh");
    DEFAULT_IDENTITIES
        .iter()
        .map(|name| ssh_dir.join(name))
        .filter(|path| path.is_file())
        .collect()
}

async fn try_identity_files(
    handle: &mut Handle<ClientHandler>,
    user: &str,
) -> Result<bool, ConnectError> {
    for path in default_identity_files() {
        let key = match russh::keys::load_secret_key(&path, None) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!("Skipping identity {}: {}", path.display(), e);
                continue;
            }
        };
        let hash_alg = handle.best_supported_rsa_hash().await.map_err(transport)?.flatten();
        let result = handle
            .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
            .await
            .map_err(transport)?;
        if matches!(result, AuthResult::Success) {
            tracing::info!("Authenticated as {} with {}", user, path.display());
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(unix)]
async fn try_agent(handle: &mut Handle<ClientHandler>, user: &str) -> Result<bool, ConnectError> {
    use russh::keys::agent::client::AgentClient;

    let mut agent = match AgentClient::connect_env().await {
        Ok(agent) => agent,
        Err(e) => {
            tracing::debug!("No ssh agent available: {}", e);
            return Ok(false);
        }
    };
    let identities = match agent.request_identities().await {
        Ok(identities) => identities,
        Err(e) => {
            tracing::debug!("Could not list agent identities: {}", e);
            return Ok(false);
        }
    };
    for key in identities {
        let hash_alg = handle.best_supported_rsa_hash().await.map_err(transport)?.flatten();
        match handle
            .authenticate_publickey_with(user, key, hash_alg, &mut agent)
            .await
        {
            Ok(AuthResult::Success) => {
                tracing::info!("Authenticated as {} with an agent identity", user);
                return Ok(true);
            }
            Ok(AuthResult::Failure { .. }) => {}
            Err(e) => tracing::debug!("Agent signing failed: {:?}", e),
        }
    }
    Ok(false)
}

#[cfg(not(unix))]
async fn try_agent(_handle: &mut Handle<ClientHandler>, _user: &str) -> Result<bool, ConnectError> {
    Ok(false)
}

async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    user: &str,
    password: Option<&str>,
) -> Result<(), ConnectError> {
    if try_agent(handle, user).await? || try_identity_files(handle, user).await? {
        return Ok(());
    }
    let Some(password) = password else {
        return Err(AuthFailure::NeedsPassword.into());
    };
    let result = handle
        .authenticate_password(user, password)
        .await
        .map_err(transport)?;
    match result {
        AuthResult::Success => {
            tracing::info!("Authenticated as {} with password", user);
            Ok(())
        }
        AuthResult::Failure { .. } => Err(AuthFailure::WrongPassword.into()),
    }
}

/// Opens one SSH connection per `connect` call.
#[derive(Debug, Clone)]
pub struct SshConnector {
    target: SshTarget,
    settings: SshSettings,
}

impl SshConnector {
    pub fn new(target: SshTarget, settings: SshSettings) -> Self {
        Self { target, settings }
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        credentials: Option<Credentials>,
    ) -> Result<Box<dyn CommandRunner>, ConnectError> {
        let target = &self.target;
        let user = credentials
            .as_ref()
            .and_then(|c| c.username.clone())
            .or_else(|| target.user.clone())
            .or_else(default_username)
            .ok_or_else(|| {
                ConnectError::Configuration("cannot determine the remote user name".into())
            })?;

        let config = Arc::new(Config {
            keepalive_interval: Some(self.settings.keepalive_interval),
            ..Default::default()
        });
        let handler = ClientHandler {
            host: target.host.clone(),
            port: target.port,
        };

        tracing::info!("Connecting to {}@{}:{}", user, target.host, target.port);
        let connect = russh::client::connect(config, (target.host.as_str(), target.port), handler);
        let mut handle = tokio::time::timeout(self.settings.connect_timeout, connect)
            .await
            .map_err(|_| ConnectError::Transport(format!("timed out connecting to {}", target)))?
            .map_err(transport)?;

        let password = credentials.as_ref().map(|c| c.password.as_str());
        tokio::time::timeout(
            self.settings.auth_timeout,
            authenticate(&mut handle, &user, password),
        )
        .await
        .map_err(|_| ConnectError::Transport(format!("authentication to {} timed out", target)))??;

        Ok(Box::new(SshRunner {
            handle,
            label: format!("{}@{}:{}", user, target.host, target.port),
        }))
    }

    fn remote_target(&self) -> Option<String> {
        Some(self.target.destination())
    }
}

/// How the remote process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Ending {
    Status(i32),
    Signal(String),
}

/// Output and ending collected from one exec channel.
#[derive(Debug, Default)]
struct Capture {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    ending: Option<Ending>,
}

impl Capture {
    /// Fold one channel message in; true once the channel is closed.
    fn handle_message(&mut self, msg: &ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { data, ext: 1 } => self.stderr.extend_from_slice(data),
            ChannelMsg::ExitStatus { exit_status } => {
                self.ending = Some(Ending::Status(*exit_status as i32));
            }
            ChannelMsg::ExitSignal {
                signal_name,
                error_message,
                ..
            } => {
                let mut signal = format!("{:?}", signal_name);
                if !error_message.is_empty() {
                    signal = format!("{} ({})", signal, error_message);
                }
                self.ending = Some(Ending::Signal(signal));
            }
            ChannelMsg::Close => return true,
            _ => {}
        }
        false
    }

    /// Output lines on a clean exit. A channel that ends without reporting
    /// an exit status lost its connection.
    fn finish(self, command: &str, label: &str) -> Result<Vec<String>, RunError> {
        let stderr = String::from_utf8_lossy(&self.stderr).trim().to_string();
        match self.ending {
            Some(Ending::Status(0)) => Ok(output_lines(&String::from_utf8_lossy(&self.stdout))),
            Some(Ending::Status(status)) => Err(RunError::Exit {
                command: command.to_string(),
                status,
                stderr,
            }),
            Some(Ending::Signal(signal)) => Err(RunError::Exit {
                command: command.to_string(),
                status: -1,
                stderr: if stderr.is_empty() {
                    format!("killed by signal {}", signal)
                } else {
                    format!("killed by signal {}: {}", signal, stderr)
                },
            }),
            None => Err(RunError::Transport(format!(
                "{} ended without an exit status on {}",
                command, label
            ))),
        }
    }
}

/// Runs each command on its own exec channel of a shared connection.
pub struct SshRunner {
    handle: Handle<ClientHandler>,
    label: String,
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run(&self, command: &str) -> Result<Vec<String>, RunError> {
        if self.handle.is_closed() {
            return Err(RunError::Transport(format!("connection to {} is closed", self.label)));
        }
        let lost = |e: russh::Error| RunError::Transport(e.to_string());

        tracing::debug!("Executing on {}: {}", self.label, command);
        let mut channel = self.handle.channel_open_session().await.map_err(lost)?;
        channel.exec(true, command).await.map_err(lost)?;

        let mut capture = Capture::default();
        while let Some(msg) = channel.wait().await {
            if capture.handle_message(&msg) {
                break;
            }
        }
        let _ = channel.close().await;

        capture.finish(command, &self.label)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

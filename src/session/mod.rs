//! Persistent SSH sessions over the system OpenSSH client.
//!
//! A session is one multiplexed connection: [`SshConnector::connect`] starts
//! an OpenSSH control master bound to a private socket, every
//! [`SshSession::execute`] call rides that master, and [`SshSession::close`]
//! asks the master to exit. The master also carries a `ControlPersist`
//! timeout so it cannot outlive an aborted process for long.

use std::ffi::OsString;

use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::InstanceNetworking;

mod config;
mod types;
mod util;

pub use config::{DEFAULT_CONTROL_DIR, DEFAULT_SSH_USER, SessionConfig, SessionConfigLoadError};
pub use types::{CommandOutput, CommandRunner, ProcessCommandRunner, RemoteCommandOutput, RunnerFuture};
pub use util::{expand_tilde, public_key_path};

/// Errors surfaced while connecting to or using a remote session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// Raised when configuration is missing required values.
    #[error("invalid ssh configuration: missing {field}")]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when authentication or the network connection fails.
    #[error("ssh connection to {target} failed after {attempts} attempt(s): {message}")]
    Connection {
        /// `user@host` the session targeted.
        target: String,
        /// Number of attempts made.
        attempts: u32,
        /// Diagnostic from the last attempt.
        message: String,
    },
    /// Raised when the SSH client finishes without yielding an exit status.
    #[error("{program} did not return an exit code")]
    MissingExitCode {
        /// Command that completed without a status.
        program: String,
    },
    /// Raised when the control master refuses to exit.
    #[error("failed to close ssh session to {target}: {message}")]
    Close {
        /// `user@host` the session targeted.
        target: String,
        /// Diagnostic reported by the client.
        message: String,
    },
    /// Raised when the connection attempt was cancelled externally.
    #[error("ssh connection cancelled")]
    Cancelled,
}

/// Opens SSH sessions using a fixed configuration and command runner.
#[derive(Clone, Debug)]
pub struct SshConnector<R: CommandRunner> {
    config: SessionConfig,
    runner: R,
}

impl SshConnector<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(config: SessionConfig) -> Result<Self, SessionError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshConnector<R> {
    /// Creates a new connector using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(config: SessionConfig, runner: R) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Returns a reference to the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Establishes the control master for `networking`.
    ///
    /// Attempts are retried up to `connect_attempts` times because sshd often
    /// starts a little after the provider reports the host healthy.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connection`] when every attempt fails,
    /// [`SessionError::Spawn`] when the SSH client cannot be started, and
    /// [`SessionError::Cancelled`] when `cancel` fires.
    pub async fn connect(
        &self,
        networking: &InstanceNetworking,
        cancel: &CancellationToken,
    ) -> Result<SshSession<'_, R>, SessionError> {
        let session = SshSession {
            connector: self,
            target: format!("{}@{}", self.config.ssh_user, networking.public_ip),
            port: networking.ssh_port,
            control_path: self.control_path(),
        };

        let attempts = self.config.connect_attempts;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let args = session.client_args("true");
            let result = tokio::select! {
                () = cancel.cancelled() => return Err(SessionError::Cancelled),
                result = self.runner.run(&self.config.ssh_bin, &args) => result,
            };

            match result {
                Ok(output) if output.is_success() => {
                    info!(target_host = %session.target, attempt, "ssh session established");
                    return Ok(session);
                }
                Ok(output) => last_error = describe_failure(&output),
                Err(err @ SessionError::Spawn { .. }) => return Err(err),
                Err(err) => last_error = err.to_string(),
            }

            if attempt < attempts {
                warn!(
                    target_host = %session.target,
                    attempt,
                    error = %last_error,
                    "ssh connection failed, retrying"
                );
                tokio::select! {
                    () = cancel.cancelled() => return Err(SessionError::Cancelled),
                    () = sleep(self.config.connect_retry_delay()) => {}
                }
            }
        }

        Err(SessionError::Connection {
            target: session.target,
            attempts,
            message: last_error,
        })
    }

    fn control_path(&self) -> String {
        format!(
            "{}/benchferry-{}.sock",
            self.config.control_dir.trim_end_matches('/'),
            Uuid::new_v4().simple()
        )
    }
}

/// A live SSH session to one host.
///
/// Commands run one at a time. [`SshSession::close`] consumes the session, so
/// no command can be issued after it has been closed.
#[derive(Debug)]
pub struct SshSession<'a, R: CommandRunner> {
    connector: &'a SshConnector<R>,
    target: String,
    port: u16,
    control_path: String,
}

impl<R: CommandRunner> SshSession<'_, R> {
    /// Returns the `user@host` this session is bound to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the control master socket path.
    #[must_use]
    pub fn control_path(&self) -> &str {
        &self.control_path
    }

    /// Runs `command` on the remote host and waits for it to terminate.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Spawn`] if the client cannot be started and
    /// [`SessionError::MissingExitCode`] if it ends without an exit status
    /// (for example, when killed by a signal).
    ///
    /// # Security
    ///
    /// `command` is passed verbatim to the remote shell; callers must escape
    /// untrusted input.
    pub async fn execute(&self, command: &str) -> Result<RemoteCommandOutput, SessionError> {
        let config = self.connector.config();
        let args = self.client_args(command);
        debug!(target_host = %self.target, command, "executing remote command");
        let output = self.connector.runner.run(&config.ssh_bin, &args).await?;
        let Some(exit_code) = output.code else {
            return Err(SessionError::MissingExitCode {
                program: config.ssh_bin.clone(),
            });
        };

        Ok(RemoteCommandOutput {
            exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Stops the control master and releases the connection.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Close`] when the client reports a failure and
    /// [`SessionError::Spawn`] when it cannot be started.
    pub async fn close(self) -> Result<(), SessionError> {
        let config = self.connector.config();
        let args = vec![
            OsString::from("-o"),
            OsString::from(format!("ControlPath={}", self.control_path)),
            OsString::from("-O"),
            OsString::from("exit"),
            OsString::from(self.target.as_str()),
        ];
        let output = self.connector.runner.run(&config.ssh_bin, &args).await?;
        if output.is_success() {
            debug!(target_host = %self.target, "ssh session closed");
            return Ok(());
        }
        Err(SessionError::Close {
            target: self.target,
            message: describe_failure(&output),
        })
    }

    fn client_args(&self, remote_command: &str) -> Vec<OsString> {
        let config = self.connector.config();
        let mut args = vec![OsString::from("-p"), OsString::from(self.port.to_string())];

        if let Some(ref identity_file) = config.ssh_identity_file {
            args.push(OsString::from("-i"));
            args.push(OsString::from(expand_tilde(identity_file)));
        }

        let mut options = Vec::new();
        if config.ssh_batch_mode {
            options.push(String::from("BatchMode=yes"));
        }
        if !config.ssh_strict_host_key_checking {
            options.push(String::from("StrictHostKeyChecking=no"));
        }
        if !config.ssh_known_hosts_file.trim().is_empty() {
            options.push(format!(
                "UserKnownHostsFile={}",
                config.ssh_known_hosts_file
            ));
        }
        options.push(format!("ConnectTimeout={}", config.connect_timeout_secs));
        options.push(String::from("ControlMaster=auto"));
        options.push(format!("ControlPath={}", self.control_path));
        options.push(format!("ControlPersist={}s", config.control_persist_secs));

        for option in options {
            args.push(OsString::from("-o"));
            args.push(OsString::from(option));
        }

        args.push(OsString::from(self.target.as_str()));
        args.push(OsString::from(remote_command));
        args
    }
}

fn describe_failure(output: &CommandOutput) -> String {
    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_owned();
    }
    output.code.map_or_else(
        || String::from("terminated without an exit status"),
        |code| format!("exit status {code}"),
    )
}

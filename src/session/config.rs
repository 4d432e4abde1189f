//! SSH session configuration and validation.
//!
//! [`SessionConfig`] is loaded via `ortho-config`, which merges defaults,
//! configuration files, and environment variables.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use super::SessionError;

/// Default remote user for the benchmark image.
pub const DEFAULT_SSH_USER: &str = "ubuntu";

/// Default directory holding the control master socket.
pub const DEFAULT_CONTROL_DIR: &str = "/tmp";

/// SSH settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "BENCHFERRY_SSH",
    discovery(
        app_name = "benchferry",
        env_var = "BENCHFERRY_CONFIG_PATH",
        config_file_name = "benchferry.toml",
        dotfile_name = ".benchferry.toml",
        project_file_name = "benchferry.toml"
    )
)]
pub struct SessionConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Remote user to connect as.
    #[ortho_config(default = DEFAULT_SSH_USER.to_owned())]
    pub ssh_user: String,
    /// Whether to force batch mode so SSH never prompts.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Whether to enforce host key checking. Off by default because every
    /// host is freshly provisioned.
    #[ortho_config(default = false)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file override.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub ssh_known_hosts_file: String,
    /// Private key used to authenticate. Supports `~/` expansion. The CLI
    /// `--key-file` flag takes precedence.
    pub ssh_identity_file: Option<String>,
    /// Directory that holds the control master socket.
    #[ortho_config(default = DEFAULT_CONTROL_DIR.to_owned())]
    pub control_dir: String,
    /// Seconds an idle control master survives once no client is attached.
    #[ortho_config(default = 60)]
    pub control_persist_secs: u64,
    /// TCP connect timeout in seconds for each SSH attempt.
    #[ortho_config(default = 10)]
    pub connect_timeout_secs: u64,
    /// Number of connection attempts before giving up.
    #[ortho_config(default = 3)]
    pub connect_attempts: u32,
    /// Seconds to wait between connection attempts.
    #[ortho_config(default = 5)]
    pub connect_retry_delay_secs: u64,
}

/// Errors raised when loading the session configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SessionConfigLoadError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("ssh configuration parsing failed: {0}")]
    Parse(String),
}

impl SessionConfig {
    /// Loads configuration using defaults, configuration files, and
    /// environment variables, ignoring process arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SessionConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SessionConfigLoadError> {
        Self::load_from_iter([OsString::from("benchferry")])
            .map_err(|err| SessionConfigLoadError::Parse(err.to_string()))
    }

    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when a required field is empty
    /// or `connect_attempts` is zero.
    pub fn validate(&self) -> Result<(), SessionError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.ssh_user, "ssh_user")?;
        Self::require_value(&self.control_dir, "control_dir")?;
        Self::require_optional_value(self.ssh_identity_file.as_deref(), "ssh_identity_file")?;
        if self.connect_attempts == 0 {
            return Err(SessionError::InvalidConfig {
                field: String::from("connect_attempts"),
            });
        }
        Ok(())
    }

    /// Returns a copy with the identity file replaced.
    #[must_use]
    pub fn with_identity_file(mut self, identity_file: impl Into<String>) -> Self {
        self.ssh_identity_file = Some(identity_file.into());
        self
    }

    /// Delay between connection attempts.
    #[must_use]
    pub const fn connect_retry_delay(&self) -> Duration {
        Duration::from_secs(self.connect_retry_delay_secs)
    }

    fn require_value(value: &str, field: &str) -> Result<(), SessionError> {
        if value.trim().is_empty() {
            return Err(SessionError::InvalidConfig {
                field: field.to_owned(),
            });
        }
        Ok(())
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), SessionError> {
        match value {
            Some(inner) => Self::require_value(inner, field),
            None => Ok(()),
        }
    }
}

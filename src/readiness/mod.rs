//! Bounded polling of a resource until it reports ready.
//!
//! The poller repeatedly asks the backend for a [`StatusSnapshot`] and only
//! declares the resource ready when both the instance and the system signal
//! report ok in the same snapshot. A resource that is not yet visible to the
//! status API is retried after a short delay; a visible but unhealthy
//! resource after a longer one. Polling is bounded by an overall deadline and
//! an optional attempt cap, and honours a cancellation token.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::{Instant, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::{Backend, InstanceHandle, InstanceNetworking};

const PENDING_DELAY: Duration = Duration::from_secs(2);
const RETRY_DELAY: Duration = Duration::from_secs(10);
const READINESS_TIMEOUT: Duration = Duration::from_secs(900);

/// Polling settings layered via `OrthoConfig`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "BENCHFERRY_READINESS",
    discovery(
        app_name = "benchferry",
        env_var = "BENCHFERRY_CONFIG_PATH",
        config_file_name = "benchferry.toml",
        dotfile_name = ".benchferry.toml",
        project_file_name = "benchferry.toml"
    )
)]
pub struct ReadinessConfig {
    /// Delay in seconds while the resource is not yet visible.
    #[ortho_config(default = 2)]
    pub pending_delay_secs: u64,
    /// Delay in seconds between checks of a visible but unready resource.
    #[ortho_config(default = 10)]
    pub retry_delay_secs: u64,
    /// Overall time budget in seconds.
    #[ortho_config(default = 900)]
    pub timeout_secs: u64,
    /// Optional cap on the number of status queries.
    pub max_attempts: Option<u32>,
}

/// Errors raised when loading or validating the readiness configuration.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ReadinessConfigError {
    /// Indicates that parsing or merging configuration layers failed.
    #[error("readiness configuration parsing failed: {0}")]
    Parse(String),
    /// Indicates a value that would make polling meaningless.
    #[error("invalid readiness configuration: {0} must be greater than zero")]
    Invalid(String),
}

impl ReadinessConfig {
    /// Loads configuration without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ReadinessConfigError> {
        Self::load_from_iter([OsString::from("benchferry")])
            .map_err(|err| ReadinessConfigError::Parse(err.to_string()))
    }

    /// Converts the configuration into a polling policy.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessConfigError::Invalid`] when the timeout or the
    /// attempt cap is zero.
    pub fn policy(&self) -> Result<ReadinessPolicy, ReadinessConfigError> {
        if self.timeout_secs == 0 {
            return Err(ReadinessConfigError::Invalid(String::from("timeout_secs")));
        }
        if self.max_attempts == Some(0) {
            return Err(ReadinessConfigError::Invalid(String::from("max_attempts")));
        }
        Ok(ReadinessPolicy {
            pending_delay: Duration::from_secs(self.pending_delay_secs),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: self.max_attempts,
        })
    }
}

/// Timing parameters for [`ReadinessPoller`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadinessPolicy {
    /// Delay while the status API has no record of the resource.
    pub pending_delay: Duration,
    /// Delay while the resource is visible but not ready.
    pub retry_delay: Duration,
    /// Overall deadline measured from the first query. It also bounds each
    /// status and details query in flight.
    pub timeout: Duration,
    /// Optional cap on the number of status queries.
    pub max_attempts: Option<u32>,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            pending_delay: PENDING_DELAY,
            retry_delay: RETRY_DELAY,
            timeout: READINESS_TIMEOUT,
            max_attempts: None,
        }
    }
}

/// Errors surfaced while waiting for a resource to become ready.
#[derive(Debug, Error)]
pub enum ReadinessError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the resource is not ready within the configured bound.
    #[error("resource {resource} not ready after {attempts} status checks in {}s", .elapsed.as_secs())]
    Timeout {
        /// Resource being waited on.
        resource: String,
        /// Number of status queries issued.
        attempts: u32,
        /// Time spent polling.
        elapsed: Duration,
    },
    /// Raised when the provider reports a permanent failure.
    #[error("resource {resource} failed readiness checks: {reason}")]
    Failed {
        /// Resource being waited on.
        resource: String,
        /// Human-readable description of the failure.
        reason: String,
    },
    /// Raised when a status or details query fails.
    #[error("status query failed: {0}")]
    Provider(#[source] E),
    /// Raised when the wait was cancelled externally.
    #[error("readiness wait cancelled")]
    Cancelled,
}

/// Polls a backend until a resource is ready.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadinessPoller {
    policy: ReadinessPolicy,
}

impl ReadinessPoller {
    /// Creates a poller with the given policy.
    #[must_use]
    pub const fn new(policy: ReadinessPolicy) -> Self {
        Self { policy }
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &ReadinessPolicy {
        &self.policy
    }

    /// Waits until both health signals report ok, then returns the public
    /// networking details of the resource.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessError::Timeout`] when the deadline or attempt cap is
    /// reached, [`ReadinessError::Failed`] when the provider reports a
    /// permanent failure or no address after readiness,
    /// [`ReadinessError::Provider`] when a query fails, and
    /// [`ReadinessError::Cancelled`] when `cancel` fires.
    pub async fn wait<B: Backend>(
        &self,
        backend: &B,
        handle: &InstanceHandle,
        cancel: &CancellationToken,
    ) -> Result<InstanceNetworking, ReadinessError<B::Error>> {
        let started = Instant::now();
        let deadline = started + self.policy.timeout;
        let mut attempts: u32 = 0;

        let ready = loop {
            if self.exhausted(started, attempts) {
                return Err(timed_out(handle, attempts, started));
            }

            attempts = attempts.saturating_add(1);
            let status = tokio::select! {
                () = cancel.cancelled() => return Err(ReadinessError::Cancelled),
                result = timeout_at(deadline, backend.describe_status(handle)) => match result {
                    Ok(status) => status.map_err(ReadinessError::Provider)?,
                    Err(_elapsed) => return Err(timed_out(handle, attempts, started)),
                },
            };

            let delay = match status {
                None => {
                    debug!(resource = %handle, attempt = attempts, "status not yet visible");
                    self.policy.pending_delay
                }
                Some(snapshot) if snapshot.is_failed() => {
                    return Err(ReadinessError::Failed {
                        resource: handle.to_string(),
                        reason: format!(
                            "instance status {}, system status {}",
                            snapshot.instance, snapshot.system
                        ),
                    });
                }
                Some(snapshot) if snapshot.is_ready() => break snapshot,
                Some(snapshot) => {
                    info!(
                        resource = %handle,
                        attempt = attempts,
                        instance_status = %snapshot.instance,
                        system_status = %snapshot.system,
                        retry_in_secs = self.policy.retry_delay.as_secs(),
                        "resource not ready, retrying"
                    );
                    self.policy.retry_delay
                }
            };

            let wake = (Instant::now() + delay).min(deadline);
            tokio::select! {
                () = cancel.cancelled() => return Err(ReadinessError::Cancelled),
                () = sleep_until(wake) => {}
            }
        };

        let details = tokio::select! {
            () = cancel.cancelled() => return Err(ReadinessError::Cancelled),
            result = timeout_at(deadline, backend.describe_details(handle)) => match result {
                Ok(details) => details.map_err(ReadinessError::Provider)?,
                Err(_elapsed) => return Err(timed_out(handle, attempts, started)),
            },
        };
        let Some(public_ip) = details.public_ip else {
            return Err(ReadinessError::Failed {
                resource: handle.to_string(),
                reason: String::from("ready but no public address assigned"),
            });
        };

        info!(
            resource = %handle,
            %public_ip,
            attempts,
            instance_status = %ready.instance,
            system_status = %ready.system,
            "resource ready"
        );
        Ok(InstanceNetworking {
            public_ip,
            ssh_port: details.ssh_port,
        })
    }

    fn exhausted(&self, started: Instant, attempts: u32) -> bool {
        if self
            .policy
            .max_attempts
            .is_some_and(|limit| attempts >= limit)
        {
            return true;
        }
        attempts > 0 && started.elapsed() >= self.policy.timeout
    }
}

fn timed_out<E>(handle: &InstanceHandle, attempts: u32, started: Instant) -> ReadinessError<E>
where
    E: std::error::Error + 'static,
{
    ReadinessError::Timeout {
        resource: handle.to_string(),
        attempts,
        elapsed: started.elapsed(),
    }
}

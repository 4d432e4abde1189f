//! Scaleway backend implementation of the resource lifecycle.
//!
//! Servers are created stopped, joined to the requested private network and
//! then powered on. Readiness is reported as two signals: the server state
//! from the Instances API and whether the SSH port accepts TCP connections on
//! the public address.

mod error;
mod lifecycle;
mod types;

use std::time::Duration;

use scaleway_rs::ScalewayApi;
use tracing::{info, warn};

use crate::backend::{
    Backend, BackendFuture, InstanceHandle, ResourceDetails, ResourceSpec, StatusSnapshot,
};
use crate::config::ScalewayConfig;
use types::Action;

const DEFAULT_SSH_PORT: u16 = 22;
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(300);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub use error::ScalewayBackendError;
pub use lifecycle::authorized_key_tag;

/// Backend that provisions servers through the Scaleway Instances API.
#[derive(Clone)]
pub struct ScalewayBackend {
    api: ScalewayApi,
    config: ScalewayConfig,
    ssh_port: u16,
    poll_interval: Duration,
    teardown_timeout: Duration,
    probe_timeout: Duration,
}

impl std::fmt::Debug for ScalewayBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalewayBackend")
            .field("zone", &self.config.default_zone)
            .field("ssh_port", &self.ssh_port)
            .finish_non_exhaustive()
    }
}

impl ScalewayBackend {
    /// Constructs a new backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayBackendError::Config`] when the provided configuration
    /// fails validation.
    pub fn new(config: ScalewayConfig) -> Result<Self, ScalewayBackendError> {
        config.validate()?;
        Ok(Self {
            api: ScalewayApi::new(&config.secret_key),
            config,
            ssh_port: DEFAULT_SSH_PORT,
            poll_interval: POLL_INTERVAL,
            teardown_timeout: TEARDOWN_TIMEOUT,
            probe_timeout: PROBE_TIMEOUT,
        })
    }

    /// Returns the configuration the backend was built from.
    #[must_use]
    pub const fn config(&self) -> &ScalewayConfig {
        &self.config
    }

    async fn discard_instance(&self, handle: &InstanceHandle) {
        match self.api.delete_instance_async(&handle.zone, &handle.id).await {
            Ok(_) => info!(resource = %handle, "discarded partially created server"),
            Err(err) => warn!(
                resource = %handle,
                error = %err,
                "failed to discard partially created server; delete it manually"
            ),
        }
    }
}

impl Backend for ScalewayBackend {
    type Error = ScalewayBackendError;

    fn create<'a>(
        &'a self,
        spec: &'a ResourceSpec,
    ) -> BackendFuture<'a, InstanceHandle, Self::Error> {
        Box::pin(async move {
            spec.validate()?;
            let image_id = self.resolve_image_id(spec).await?;
            let snapshot = self.create_instance_stopped(spec, &image_id).await?;
            let handle = InstanceHandle {
                id: snapshot.id.clone(),
                zone: spec.zone.clone(),
            };
            info!(resource = %handle, machine_class = %spec.machine_class, "server created");

            let prepared = match spec.network.subnet_id.as_deref() {
                Some(private_network_id) => {
                    self.attach_private_network(&handle, private_network_id)
                        .await
                }
                None => Ok(()),
            };
            let started = match prepared {
                Ok(()) => self.power_on_if_needed(&handle.zone, &snapshot).await,
                Err(err) => Err(err),
            };

            if let Err(err) = started {
                self.discard_instance(&handle).await;
                return Err(err);
            }
            Ok(handle)
        })
    }

    fn describe_status<'a>(
        &'a self,
        handle: &'a InstanceHandle,
    ) -> BackendFuture<'a, Option<StatusSnapshot>, Self::Error> {
        Box::pin(async move {
            let Some(server) = self.fetch_instance(handle).await? else {
                return Ok(None);
            };
            let system = self.probe_system(&server).await;
            Ok(Some(StatusSnapshot::new(server.state.health(), system)))
        })
    }

    fn describe_details<'a>(
        &'a self,
        handle: &'a InstanceHandle,
    ) -> BackendFuture<'a, ResourceDetails, Self::Error> {
        Box::pin(async move {
            let server = self.fetch_instance(handle).await?.ok_or_else(|| {
                ScalewayBackendError::InstanceNotFound {
                    instance_id: handle.id.clone(),
                }
            })?;
            Ok(ResourceDetails {
                public_ip: server.public_address(),
                ssh_port: self.ssh_port,
            })
        })
    }

    fn terminate<'a>(&'a self, handle: &'a InstanceHandle) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let Some(server) = self.fetch_instance(handle).await? else {
                return Ok(());
            };
            if server.allows(&Action::from("terminate")) {
                self.api
                    .perform_instance_action_async(&handle.zone, &handle.id, "terminate")
                    .await?;
            } else {
                self.api
                    .delete_instance_async(&handle.zone, &handle.id)
                    .await?;
            }
            if self.config.confirm_teardown {
                self.wait_until_gone(handle).await?;
            }
            Ok(())
        })
    }
}

//! Status probes and teardown waits for the Scaleway backend.

use tokio::net::TcpStream;
use tokio::time::{Instant, sleep_until, timeout, timeout_at};
use tracing::debug;

use crate::backend::{HealthStatus, InstanceHandle};

use super::super::{ScalewayBackend, ScalewayBackendError};
use super::InstanceSnapshot;

impl ScalewayBackend {
    pub(in crate::scaleway) async fn fetch_instance(
        &self,
        handle: &InstanceHandle,
    ) -> Result<Option<InstanceSnapshot>, ScalewayBackendError> {
        let mut servers = self
            .api
            .list_instances(&handle.zone)
            .servers(&handle.id)
            .per_page(1)
            .run_async()
            .await?;

        Ok(servers.pop().map(InstanceSnapshot::from))
    }

    /// Reports the system signal: ok once the server runs, has a public
    /// address and accepts TCP connections on the SSH port.
    pub(in crate::scaleway) async fn probe_system(&self, server: &InstanceSnapshot) -> HealthStatus {
        if !server.state.is_running() {
            return HealthStatus::Initializing;
        }
        let Some(address) = server.public_address() else {
            return HealthStatus::Initializing;
        };
        let connect = timeout(
            self.probe_timeout,
            TcpStream::connect((address, self.ssh_port)),
        )
        .await;
        if matches!(connect, Ok(Ok(_))) {
            HealthStatus::Ok
        } else {
            debug!(instance_id = %server.id, %address, "ssh port not accepting connections yet");
            HealthStatus::Initializing
        }
    }

    pub(in crate::scaleway) async fn wait_until_gone(
        &self,
        handle: &InstanceHandle,
    ) -> Result<(), ScalewayBackendError> {
        let deadline = Instant::now() + self.teardown_timeout;
        while Instant::now() <= deadline {
            let Ok(fetched) = timeout_at(deadline, self.fetch_instance(handle)).await else {
                break;
            };
            if fetched?.is_none() {
                return Ok(());
            }
            sleep_until((Instant::now() + self.poll_interval).min(deadline)).await;
        }

        Err(ScalewayBackendError::ResidualResource {
            instance_id: handle.id.clone(),
        })
    }
}

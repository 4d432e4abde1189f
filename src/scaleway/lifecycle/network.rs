//! Private network attachment for the Scaleway backend.

use serde::Serialize;

use crate::backend::InstanceHandle;

use super::super::{ScalewayBackend, ScalewayBackendError};

#[derive(Serialize)]
struct AttachPrivateNicRequest<'a> {
    private_network_id: &'a str,
}

impl ScalewayBackend {
    /// Joins the server to a private network.
    ///
    /// `scaleway-rs` does not expose private NICs, so this is a direct call.
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayBackendError::PrivateNetworkAttachFailed`] when the
    /// API rejects the request.
    pub(in crate::scaleway) async fn attach_private_network(
        &self,
        handle: &InstanceHandle,
        private_network_id: &str,
    ) -> Result<(), ScalewayBackendError> {
        let url = format!(
            "{}/zones/{}/servers/{}/private_nics",
            super::SCALEWAY_INSTANCE_API_BASE,
            handle.zone,
            handle.id
        );
        let payload = AttachPrivateNicRequest { private_network_id };
        let failed = |message: String| ScalewayBackendError::PrivateNetworkAttachFailed {
            private_network_id: private_network_id.to_owned(),
            instance_id: handle.id.clone(),
            message,
        };

        let (status, body) = super::post_json(&self.config.secret_key, &url, &payload)
            .await
            .map_err(|err| failed(err.to_string()))?;
        if status.is_success() {
            return Ok(());
        }
        Err(failed(String::from_utf8_lossy(&body).into_owned()))
    }
}

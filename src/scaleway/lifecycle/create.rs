//! Server creation helpers for the Scaleway backend.
//!
//! Servers are created stopped so the private network can be attached before
//! first boot. The root volume, security group and authorised key are all
//! part of the creation request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::ResourceSpec;

use super::super::{ScalewayBackend, ScalewayBackendError};
use super::InstanceSnapshot;

const BYTES_PER_GB: u64 = 1_000_000_000;

#[derive(Debug, Serialize)]
pub(super) struct RootVolume {
    size: u64,
    volume_type: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateServerRequest {
    name: String,
    commercial_type: String,
    image: String,
    project: String,
    routed_ip_enabled: bool,
    dynamic_ip_required: bool,
    tags: Vec<String>,
    volumes: BTreeMap<String, RootVolume>,
    #[serde(skip_serializing_if = "Option::is_none")]
    security_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization: Option<String>,
}

impl CreateServerRequest {
    pub(super) fn from_spec(spec: &ResourceSpec, image_id: &str) -> Self {
        let mut tags = vec![String::from("benchferry"), String::from("ephemeral")];
        if let Some(key) = spec.credential_ref.as_deref() {
            tags.push(authorized_key_tag(key));
        }
        let volumes = BTreeMap::from([(
            String::from("0"),
            RootVolume {
                size: u64::from(spec.storage.size_gb) * BYTES_PER_GB,
                volume_type: spec.storage.volume_type.clone(),
            },
        )]);

        Self {
            name: format!("benchferry-{}", Uuid::new_v4().simple()),
            commercial_type: spec.machine_class.clone(),
            image: image_id.to_owned(),
            project: spec.project_id.clone(),
            routed_ip_enabled: true,
            dynamic_ip_required: true,
            tags,
            volumes,
            security_group: spec.network.security_group_id.clone(),
            organization: spec.organisation_id.clone(),
        }
    }
}

#[derive(Deserialize)]
struct CreateServerResponse {
    server: scaleway_rs::ScalewayInstance,
}

/// Renders a public key as the `AUTHORIZED_KEY` tag Scaleway images read on
/// boot. Spaces are not allowed in tags and become underscores.
///
/// # Examples
///
/// ```
/// use benchferry::scaleway::authorized_key_tag;
///
/// let tag = authorized_key_tag("ssh-ed25519 AAAAC3Nza bench@host\n");
/// assert_eq!(tag, "AUTHORIZED_KEY=ssh-ed25519_AAAAC3Nza_bench@host");
/// ```
#[must_use]
pub fn authorized_key_tag(public_key: &str) -> String {
    let joined = public_key.split_whitespace().collect::<Vec<_>>().join("_");
    format!("AUTHORIZED_KEY={joined}")
}

impl ScalewayBackend {
    pub(in crate::scaleway) fn is_instance_type_error(
        api_err: &scaleway_rs::ScalewayApiError,
        spec: &ResourceSpec,
    ) -> bool {
        matches!(api_err.resource.as_deref(), Some("commercial_type"))
            || api_err
                .resource_id
                .as_deref()
                .is_some_and(|id| id == spec.machine_class)
            || (api_err.etype == "invalid_arguments"
                && api_err
                    .message
                    .to_ascii_lowercase()
                    .contains("commercial_type"))
    }

    pub(in crate::scaleway) async fn power_on_if_needed(
        &self,
        zone: &str,
        snapshot: &InstanceSnapshot,
    ) -> Result<(), ScalewayBackendError> {
        if snapshot.state.is_running() {
            return Ok(());
        }

        if snapshot.allows(&"poweron".into()) {
            self.api
                .perform_instance_action_async(zone, &snapshot.id, "poweron")
                .await?;
            return Ok(());
        }

        Err(ScalewayBackendError::PowerOnNotAllowed {
            instance_id: snapshot.id.clone(),
            state: snapshot.state.as_str().to_owned(),
        })
    }

    /// Creates a Scaleway server in a stopped state.
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayBackendError`] when the Scaleway API request fails or
    /// the provider rejects the requested instance type.
    pub(in crate::scaleway) async fn create_instance_stopped(
        &self,
        spec: &ResourceSpec,
        image_id: &str,
    ) -> Result<InstanceSnapshot, ScalewayBackendError> {
        let url = format!(
            "{}/zones/{}/servers",
            super::SCALEWAY_INSTANCE_API_BASE,
            spec.zone
        );
        let payload = CreateServerRequest::from_spec(spec, image_id);
        let (status, body) = super::post_json(&self.config.secret_key, &url, &payload).await?;

        if status.is_success() {
            let parsed: CreateServerResponse =
                serde_json::from_slice(&body).map_err(|err| ScalewayBackendError::Provider {
                    message: err.to_string(),
                })?;
            return Ok(InstanceSnapshot::from(parsed.server));
        }

        if let Ok(api_err) = serde_json::from_slice::<scaleway_rs::ScalewayApiError>(&body)
            && Self::is_instance_type_error(&api_err, spec)
        {
            return Err(ScalewayBackendError::InstanceTypeUnavailable {
                instance_type: spec.machine_class.clone(),
                zone: spec.zone.clone(),
            });
        }

        Err(ScalewayBackendError::Provider {
            message: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

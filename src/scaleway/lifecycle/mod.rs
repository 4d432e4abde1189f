//! Server lifecycle helpers for the Scaleway backend.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;

mod create;
mod image;
mod network;
mod wait;

pub use create::authorized_key_tag;

use super::ScalewayBackendError;
use super::types::{Action, InstanceState};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const SCALEWAY_INSTANCE_API_BASE: &str = "https://api.scaleway.com/instance/v1";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct InstanceSnapshot {
    pub(crate) id: String,
    pub(crate) state: InstanceState,
    pub(crate) allowed_actions: Vec<Action>,
    pub(crate) public_ip: Option<String>,
}

impl InstanceSnapshot {
    pub(crate) fn allows(&self, action: &Action) -> bool {
        self.allowed_actions.contains(action)
    }

    pub(crate) fn public_address(&self) -> Option<IpAddr> {
        self.public_ip
            .as_deref()
            .and_then(|ip| IpAddr::from_str(ip).ok())
    }
}

impl From<scaleway_rs::ScalewayInstance> for InstanceSnapshot {
    fn from(server: scaleway_rs::ScalewayInstance) -> Self {
        Self {
            id: server.id,
            state: server.state.into(),
            allowed_actions: server
                .allowed_actions
                .into_iter()
                .map(Action::from)
                .collect(),
            public_ip: server.public_ip.map(|ip| ip.address),
        }
    }
}

/// Posts `payload` to the Instances API and returns the raw response body.
async fn post_json<T: Serialize + Sync>(
    secret_key: &str,
    url: &str,
    payload: &T,
) -> Result<(reqwest::StatusCode, Vec<u8>), ScalewayBackendError> {
    let provider = |err: reqwest::Error| ScalewayBackendError::Provider {
        message: err.to_string(),
    };
    let response = HTTP_CLIENT
        .post(url)
        .header("X-Auth-Token", secret_key)
        .json(payload)
        .send()
        .await
        .map_err(provider)?;
    let status = response.status();
    let body = response.bytes().await.map_err(provider)?;
    Ok((status, body.to_vec()))
}

#[cfg(test)]
mod tests;

//! Unit tests for Scaleway lifecycle helpers.

use std::collections::HashMap;
use std::time::Duration;

use scaleway_rs::{ScalewayApi, ScalewayImage};

use super::InstanceSnapshot;
use crate::ScalewayConfig;
use crate::backend::ResourceSpec;
use crate::scaleway::DEFAULT_SSH_PORT;
use crate::scaleway::types::{Action, InstanceState};
use crate::scaleway::{ScalewayBackend, ScalewayBackendError};

fn snapshot(
    state: impl Into<InstanceState>,
    allowed: impl IntoIterator<Item = impl Into<Action>>,
    public_ip: Option<&str>,
) -> InstanceSnapshot {
    InstanceSnapshot {
        id: String::from("srv-1"),
        state: state.into(),
        allowed_actions: allowed.into_iter().map(Into::into).collect(),
        public_ip: public_ip.map(str::to_owned),
    }
}

#[derive(Copy, Clone)]
struct ImageSpec {
    id: &'static str,
    arch: &'static str,
    state: &'static str,
    creation_date: &'static str,
}

fn image(spec: ImageSpec) -> ScalewayImage {
    ScalewayImage {
        id: spec.id.to_owned(),
        name: String::new(),
        arch: spec.arch.to_owned(),
        creation_date: spec.creation_date.to_owned(),
        modification_date: String::new(),
        from_server: None,
        organization: String::new(),
        public: true,
        state: spec.state.to_owned(),
        project: String::new(),
        tags: vec![],
        zone: String::new(),
        root_volume: scaleway_rs::ScalewayImageRootVolume {
            id: String::new(),
            name: String::new(),
            size: 0,
            volume_type: String::new(),
        },
        default_bootscript: None,
        extra_volumes: scaleway_rs::ScalewayImageExtraVolumes {
            volumes: HashMap::new(),
        },
    }
}

fn dummy_config() -> ScalewayConfig {
    ScalewayConfig {
        secret_key: String::from("dummy"),
        default_organization_id: None,
        default_project_id: String::from("proj"),
        default_zone: String::from("fr-par-2"),
        cpu_instance_type: String::from("POP2-HC-16C-32G"),
        gpu_instance_type: String::from("GPU-3070-S"),
        cpu_image: String::from("Ubuntu 22.04 Jammy Jellyfish"),
        gpu_image: String::from("Ubuntu Jammy GPU OS 12"),
        default_architecture: String::from("x86_64"),
        root_volume_size_gb: 200,
        root_volume_type: String::from("sbs_volume"),
        confirm_teardown: false,
    }
}

fn base_spec() -> ResourceSpec {
    ResourceSpec::builder()
        .image_label("Ubuntu 22.04 Jammy Jellyfish")
        .machine_class("POP2-HC-16C-32G")
        .zone("fr-par-2")
        .project_id("proj")
        .architecture("x86_64")
        .storage(200, "sbs_volume")
        .build()
        .expect("spec fixture should be valid")
}

fn backend_fixture() -> ScalewayBackend {
    ScalewayBackend {
        api: ScalewayApi::new("dummy"),
        config: dummy_config(),
        ssh_port: DEFAULT_SSH_PORT,
        poll_interval: Duration::from_millis(1),
        teardown_timeout: Duration::from_millis(5),
        probe_timeout: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn power_on_if_needed_returns_ok_for_running() {
    let snap = snapshot("running", [Action::from("poweron")], Some("192.0.2.1"));
    let result = backend_fixture().power_on_if_needed("fr-par-2", &snap).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn power_on_if_needed_errors_when_not_allowed() {
    let snap = snapshot("stopped", Vec::<Action>::new(), None);
    let result = backend_fixture().power_on_if_needed("fr-par-2", &snap).await;
    assert!(matches!(
        result,
        Err(ScalewayBackendError::PowerOnNotAllowed { .. })
    ));
}

#[test]
fn public_address_ignores_unparseable_values() {
    assert!(
        snapshot("running", Vec::<Action>::new(), Some("not-an-ip"))
            .public_address()
            .is_none()
    );
    assert!(
        snapshot("running", Vec::<Action>::new(), Some("192.0.2.1"))
            .public_address()
            .is_some()
    );
}

mod create;

//! Unit-level tests for Scaleway backend error variants and construction.

use benchferry::{ConfigError, ScalewayBackend, ScalewayBackendError, ScalewayConfig};
use rstest::rstest;

fn valid_config() -> ScalewayConfig {
    ScalewayConfig {
        secret_key: String::from("SCWSECRETKEYEXAMPLE"),
        default_organization_id: None,
        default_project_id: String::from("11111111-2222-3333-4444-555555555555"),
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

#[rstest]
#[case(
    ScalewayBackendError::PowerOnNotAllowed {
        instance_id: String::from("instance-id"),
        state: String::from("stopped"),
    },
    "instance instance-id in state stopped cannot be powered on"
)]
#[case(
    ScalewayBackendError::ResidualResource {
        instance_id: String::from("instance-id"),
    },
    "instance instance-id still present after teardown"
)]
#[case(
    ScalewayBackendError::PrivateNetworkAttachFailed {
        private_network_id: String::from("pn-1"),
        instance_id: String::from("instance-id"),
        message: String::from("not found"),
    },
    "failed to attach private network pn-1 to instance instance-id: not found"
)]
#[case(
    ScalewayBackendError::ImageNotFound {
        label: String::from("Ubuntu"),
        arch: String::from("x86_64"),
        zone: String::from("fr-par-2"),
    },
    "image 'Ubuntu' (arch x86_64) not found in zone fr-par-2"
)]
fn error_variants_render_actionable_messages(
    #[case] error: ScalewayBackendError,
    #[case] expected: &str,
) {
    assert_eq!(error.to_string(), expected);
}

#[test]
fn backend_rejects_incomplete_configuration() {
    let config = ScalewayConfig {
        secret_key: String::new(),
        ..valid_config()
    };
    let err = ScalewayBackend::new(config).expect_err("missing secret should fail");
    assert!(
        matches!(err, ScalewayBackendError::Config(ref message) if message.contains("SCW_SECRET_KEY")),
        "unexpected error: {err}"
    );
}

#[test]
fn backend_keeps_the_configuration_it_was_built_from() {
    let backend = ScalewayBackend::new(valid_config()).expect("valid config");
    assert_eq!(backend.config(), &valid_config());
}

#[test]
fn config_errors_convert_into_backend_errors() {
    let err = ScalewayBackendError::from(ConfigError::Invalid(String::from("bad volume")));
    assert!(matches!(err, ScalewayBackendError::Config(_)));
}

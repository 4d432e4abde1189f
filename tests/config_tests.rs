//! Unit tests for configuration validation and spec construction.

#[path = "common/test_constants.rs"]
mod test_constants;

use benchferry::{ConfigError, PlacementOverrides, ResourceClass, ScalewayConfig};
use rstest::*;

use test_constants::{CPU_INSTANCE_TYPE, GPU_INSTANCE_TYPE};

#[fixture]
fn valid_config() -> ScalewayConfig {
    ScalewayConfig {
        secret_key: String::from("SCWSECRETKEYEXAMPLE"),
        default_organization_id: None,
        default_project_id: String::from("11111111-2222-3333-4444-555555555555"),
        default_zone: String::from("fr-par-2"),
        cpu_instance_type: String::from(CPU_INSTANCE_TYPE),
        gpu_instance_type: String::from(GPU_INSTANCE_TYPE),
        cpu_image: String::from("Ubuntu 22.04 Jammy Jellyfish"),
        gpu_image: String::from("Ubuntu Jammy GPU OS 12"),
        default_architecture: String::from("x86_64"),
        root_volume_size_gb: 200,
        root_volume_type: String::from("sbs_volume"),
        confirm_teardown: false,
    }
}

fn placement() -> PlacementOverrides {
    PlacementOverrides {
        subnet_id: Some(String::from("pn-1")),
        security_group_id: Some(String::from("sg-1")),
        authorized_key: Some(String::from("ssh-ed25519 AAAA bench@host")),
    }
}

#[rstest]
fn config_validation_rejects_missing_secret_with_actionable_error(valid_config: ScalewayConfig) {
    let cfg = ScalewayConfig {
        secret_key: String::new(),
        ..valid_config
    };

    let error = cfg.validate().expect_err("secret is required");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error");
    };
    assert!(
        message.contains("SCW_SECRET_KEY"),
        "error should mention env var: {message}"
    );
    assert!(
        message.contains("benchferry.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains("secret_key"),
        "error should mention TOML key: {message}"
    );
}

/// Every required field produces an error naming both the environment
/// variable and the TOML key that supply it.
#[rstest]
#[case(|cfg: &mut ScalewayConfig| cfg.default_project_id.clear(), "SCW_DEFAULT_PROJECT_ID", "default_project_id")]
#[case(|cfg: &mut ScalewayConfig| cfg.default_zone.clear(), "SCW_DEFAULT_ZONE", "default_zone")]
#[case(|cfg: &mut ScalewayConfig| cfg.cpu_instance_type.clear(), "SCW_CPU_INSTANCE_TYPE", "cpu_instance_type")]
#[case(|cfg: &mut ScalewayConfig| cfg.gpu_instance_type.clear(), "SCW_GPU_INSTANCE_TYPE", "gpu_instance_type")]
#[case(|cfg: &mut ScalewayConfig| cfg.cpu_image.clear(), "SCW_CPU_IMAGE", "cpu_image")]
#[case(|cfg: &mut ScalewayConfig| cfg.gpu_image.clear(), "SCW_GPU_IMAGE", "gpu_image")]
#[case(|cfg: &mut ScalewayConfig| cfg.default_architecture.clear(), "SCW_DEFAULT_ARCHITECTURE", "default_architecture")]
#[case(|cfg: &mut ScalewayConfig| cfg.root_volume_type.clear(), "SCW_ROOT_VOLUME_TYPE", "root_volume_type")]
fn config_validation_produces_actionable_errors(
    valid_config: ScalewayConfig,
    #[case] mutate: fn(&mut ScalewayConfig),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let mut cfg = valid_config;
    mutate(&mut cfg);
    let message = cfg.validate().expect_err("validation should fail").to_string();
    assert!(
        message.contains(env_var),
        "error should mention env var {env_var}: {message}"
    );
    assert!(
        message.contains("benchferry.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains(toml_key),
        "error should mention TOML key {toml_key}: {message}"
    );
}

#[rstest]
fn config_rejects_zero_sized_root_volume(valid_config: ScalewayConfig) {
    let cfg = ScalewayConfig {
        root_volume_size_gb: 0,
        ..valid_config
    };
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
}

#[rstest]
#[case(ResourceClass::Cpu, CPU_INSTANCE_TYPE, "Ubuntu 22.04 Jammy Jellyfish")]
#[case(ResourceClass::Gpu, GPU_INSTANCE_TYPE, "Ubuntu Jammy GPU OS 12")]
fn config_as_spec_selects_class_defaults(
    valid_config: ScalewayConfig,
    #[case] class: ResourceClass,
    #[case] machine_class: &str,
    #[case] image_label: &str,
) {
    let spec = valid_config
        .as_spec(class, &placement())
        .unwrap_or_else(|err| panic!("valid config yields spec: {err}"));

    assert_eq!(spec.machine_class, machine_class);
    assert_eq!(spec.image_label, image_label);
    assert_eq!(spec.zone, valid_config.default_zone);
    assert_eq!(spec.project_id, valid_config.default_project_id);
    assert_eq!(spec.storage.size_gb, 200);
    assert_eq!(spec.storage.volume_type, "sbs_volume");
    assert_eq!(spec.network.subnet_id.as_deref(), Some("pn-1"));
    assert_eq!(spec.network.security_group_id.as_deref(), Some("sg-1"));
    assert_eq!(
        spec.credential_ref.as_deref(),
        Some("ssh-ed25519 AAAA bench@host")
    );
}

#[rstest]
fn config_as_spec_rejects_blank_placement(valid_config: ScalewayConfig) {
    let overrides = PlacementOverrides {
        subnet_id: Some(String::from("  ")),
        ..placement()
    };
    let err = valid_config
        .as_spec(ResourceClass::Cpu, &overrides)
        .expect_err("blank subnet should be rejected");
    assert!(
        matches!(err, ConfigError::Invalid(ref message) if message.contains("network.subnet_id")),
        "unexpected error: {err}"
    );
}

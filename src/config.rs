//! Configuration loading via `ortho-config`.

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::backend::ResourceSpec;
use crate::benchmark::ResourceClass;

/// Scaleway specific configuration derived from environment variables and
/// configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SCW",
    discovery(
        app_name = "benchferry",
        env_var = "BENCHFERRY_CONFIG_PATH",
        config_file_name = "benchferry.toml",
        dotfile_name = ".benchferry.toml",
        project_file_name = "benchferry.toml"
    )
)]
pub struct ScalewayConfig {
    /// Secret key used for authentication. This value is required.
    pub secret_key: String,
    /// Organisation identifier used by some Scaleway endpoints.
    pub default_organization_id: Option<String>,
    /// Project identifier used for billing and resource scoping.
    pub default_project_id: String,
    /// Availability zone. Defaults to `fr-par-2`, which offers GPU types.
    #[ortho_config(default = "fr-par-2".to_owned())]
    pub default_zone: String,
    /// Commercial type for CPU benchmarks.
    #[ortho_config(default = "POP2-HC-16C-32G".to_owned())]
    pub cpu_instance_type: String,
    /// Commercial type for GPU benchmarks.
    #[ortho_config(default = "GPU-3070-S".to_owned())]
    pub gpu_instance_type: String,
    /// Image label for CPU benchmarks.
    #[ortho_config(default = "Ubuntu 22.04 Jammy Jellyfish".to_owned())]
    pub cpu_image: String,
    /// Image label for GPU benchmarks; should ship the NVIDIA drivers.
    #[ortho_config(default = "Ubuntu Jammy GPU OS 12".to_owned())]
    pub gpu_image: String,
    /// CPU architecture used to select the correct image variant.
    #[ortho_config(default = "x86_64".to_owned())]
    pub default_architecture: String,
    /// Root volume size in gigabytes.
    #[ortho_config(default = 200)]
    pub root_volume_size_gb: u32,
    /// Root volume type.
    #[ortho_config(default = "sbs_volume".to_owned())]
    pub root_volume_type: String,
    /// Wait until the server has disappeared after requesting termination.
    #[ortho_config(default = false)]
    pub confirm_teardown: bool,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

/// Placement overrides supplied on the command line.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PlacementOverrides {
    /// Private network the server joins.
    pub subnet_id: Option<String>,
    /// Security group applied to the server.
    pub security_group_id: Option<String>,
    /// Public key authorised on the server.
    pub authorized_key: Option<String>,
}

impl ScalewayConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [scaleway] in benchferry.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("benchferry")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Commercial type configured for `class`.
    #[must_use]
    pub fn instance_type(&self, class: ResourceClass) -> &str {
        match class {
            ResourceClass::Cpu => &self.cpu_instance_type,
            ResourceClass::Gpu => &self.gpu_instance_type,
        }
    }

    /// Image label configured for `class`.
    #[must_use]
    pub fn image(&self, class: ResourceClass) -> &str {
        match class {
            ResourceClass::Cpu => &self.cpu_image,
            ResourceClass::Gpu => &self.gpu_image,
        }
    }

    /// Builds a [`ResourceSpec`] for `class` using the configured defaults
    /// and the command-line placement.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn as_spec(
        &self,
        class: ResourceClass,
        placement: &PlacementOverrides,
    ) -> Result<ResourceSpec, ConfigError> {
        self.validate()?;
        ResourceSpec::builder()
            .image_label(self.image(class))
            .machine_class(self.instance_type(class))
            .zone(&self.default_zone)
            .project_id(&self.default_project_id)
            .organisation_id(self.default_organization_id.clone())
            .architecture(&self.default_architecture)
            .storage(self.root_volume_size_gb, &self.root_volume_type)
            .subnet_id(placement.subnet_id.clone())
            .security_group_id(placement.security_group_id.clone())
            .credential_ref(placement.authorized_key.clone())
            .build()
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when the root volume size is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (
                &self.secret_key,
                FieldMetadata::new("Scaleway API secret key", "SCW_SECRET_KEY", "secret_key"),
            ),
            (
                &self.default_project_id,
                FieldMetadata::new(
                    "Scaleway project ID",
                    "SCW_DEFAULT_PROJECT_ID",
                    "default_project_id",
                ),
            ),
            (
                &self.default_zone,
                FieldMetadata::new("availability zone", "SCW_DEFAULT_ZONE", "default_zone"),
            ),
            (
                &self.cpu_instance_type,
                FieldMetadata::new(
                    "CPU instance type",
                    "SCW_CPU_INSTANCE_TYPE",
                    "cpu_instance_type",
                ),
            ),
            (
                &self.gpu_instance_type,
                FieldMetadata::new(
                    "GPU instance type",
                    "SCW_GPU_INSTANCE_TYPE",
                    "gpu_instance_type",
                ),
            ),
            (
                &self.cpu_image,
                FieldMetadata::new("CPU image", "SCW_CPU_IMAGE", "cpu_image"),
            ),
            (
                &self.gpu_image,
                FieldMetadata::new("GPU image", "SCW_GPU_IMAGE", "gpu_image"),
            ),
            (
                &self.default_architecture,
                FieldMetadata::new(
                    "CPU architecture",
                    "SCW_DEFAULT_ARCHITECTURE",
                    "default_architecture",
                ),
            ),
            (
                &self.root_volume_type,
                FieldMetadata::new(
                    "root volume type",
                    "SCW_ROOT_VOLUME_TYPE",
                    "root_volume_type",
                ),
            ),
        ];
        for (value, metadata) in &required {
            Self::require_field(value, metadata)?;
        }
        if self.root_volume_size_gb == 0 {
            return Err(ConfigError::Invalid(String::from(
                "root_volume_size_gb must be greater than zero (SCW_ROOT_VOLUME_SIZE_GB)",
            )));
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a value that is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

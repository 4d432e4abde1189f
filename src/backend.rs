//! Backend abstraction for provisioning a disposable benchmark host.
//!
//! A backend knows how to create one resource from a [`ResourceSpec`], report
//! its health as a [`StatusSnapshot`], describe its network details and
//! terminate it. Everything above this seam (polling, lifecycle, teardown) is
//! provider agnostic.

use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

use thiserror::Error;

/// Root volume settings for a new resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageSpec {
    /// Root volume size in gigabytes.
    pub size_gb: u32,
    /// Provider specific volume type (for example `sbs_volume`).
    pub volume_type: String,
}

/// Network placement of a new resource.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NetworkPlacement {
    /// Subnet (private network) the resource joins, if any.
    pub subnet_id: Option<String>,
    /// Security boundary (security group) applied to the resource, if any.
    pub security_group_id: Option<String>,
}

/// Immutable description of the resource to provision.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceSpec {
    /// Human readable image label. The backend resolves this to a provider
    /// specific image identifier.
    pub image_label: String,
    /// Machine class (commercial type) to request.
    pub machine_class: String,
    /// Target availability zone (for example `fr-par-1`).
    pub zone: String,
    /// Project identifier used for billing and ownership.
    pub project_id: String,
    /// Optional organisation identifier when the provider requires one.
    pub organisation_id: Option<String>,
    /// CPU architecture requested for the image.
    pub architecture: String,
    /// Root volume settings.
    pub storage: StorageSpec,
    /// Subnet and security group placement.
    pub network: NetworkPlacement,
    /// Public key authorised for SSH on the new resource.
    pub credential_ref: Option<String>,
}

impl ResourceSpec {
    /// Starts a builder for a [`ResourceSpec`].
    #[must_use]
    pub fn builder() -> ResourceSpecBuilder {
        ResourceSpecBuilder::new()
    }

    /// Validates the spec, returning a descriptive error when a required
    /// field is missing.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Validation`] when any required string field is
    /// empty, an optional field is present but blank, or the root volume size
    /// is zero.
    pub fn validate(&self) -> Result<(), BackendError> {
        require(&self.image_label, "image_label")?;
        require(&self.machine_class, "machine_class")?;
        require(&self.zone, "zone")?;
        require(&self.project_id, "project_id")?;
        require(&self.architecture, "architecture")?;
        require(&self.storage.volume_type, "storage.volume_type")?;
        if self.storage.size_gb == 0 {
            return Err(BackendError::Validation(String::from("storage.size_gb")));
        }
        require_optional(self.network.subnet_id.as_deref(), "network.subnet_id")?;
        require_optional(
            self.network.security_group_id.as_deref(),
            "network.security_group_id",
        )?;
        require_optional(self.credential_ref.as_deref(), "credential_ref")?;
        Ok(())
    }
}

fn require(value: &str, field: &str) -> Result<(), BackendError> {
    if value.trim().is_empty() {
        return Err(BackendError::Validation(field.to_owned()));
    }
    Ok(())
}

fn require_optional(value: Option<&str>, field: &str) -> Result<(), BackendError> {
    match value {
        Some(inner) => require(inner, field),
        None => Ok(()),
    }
}

/// Builder for [`ResourceSpec`] that defers trimming and validation to
/// construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResourceSpecBuilder {
    image_label: String,
    machine_class: String,
    zone: String,
    project_id: String,
    organisation_id: Option<String>,
    architecture: String,
    storage_size_gb: u32,
    storage_volume_type: String,
    subnet_id: Option<String>,
    security_group_id: Option<String>,
    credential_ref: Option<String>,
}

impl ResourceSpecBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the image label.
    #[must_use]
    pub fn image_label(mut self, value: impl Into<String>) -> Self {
        self.image_label = value.into();
        self
    }

    /// Sets the machine class.
    #[must_use]
    pub fn machine_class(mut self, value: impl Into<String>) -> Self {
        self.machine_class = value.into();
        self
    }

    /// Sets the availability zone.
    #[must_use]
    pub fn zone(mut self, value: impl Into<String>) -> Self {
        self.zone = value.into();
        self
    }

    /// Sets the project identifier.
    #[must_use]
    pub fn project_id(mut self, value: impl Into<String>) -> Self {
        self.project_id = value.into();
        self
    }

    /// Sets the optional organisation identifier.
    #[must_use]
    pub fn organisation_id(mut self, value: Option<String>) -> Self {
        self.organisation_id = value;
        self
    }

    /// Sets the architecture.
    #[must_use]
    pub fn architecture(mut self, value: impl Into<String>) -> Self {
        self.architecture = value.into();
        self
    }

    /// Sets the root volume size and type.
    #[must_use]
    pub fn storage(mut self, size_gb: u32, volume_type: impl Into<String>) -> Self {
        self.storage_size_gb = size_gb;
        self.storage_volume_type = volume_type.into();
        self
    }

    /// Sets the subnet the resource joins.
    #[must_use]
    pub fn subnet_id(mut self, value: Option<String>) -> Self {
        self.subnet_id = value;
        self
    }

    /// Sets the security group applied to the resource.
    #[must_use]
    pub fn security_group_id(mut self, value: Option<String>) -> Self {
        self.security_group_id = value;
        self
    }

    /// Sets the public key authorised on the resource.
    #[must_use]
    pub fn credential_ref(mut self, value: Option<String>) -> Self {
        self.credential_ref = value;
        self
    }

    /// Builds and validates the [`ResourceSpec`], trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Validation`] when any required field is empty.
    pub fn build(self) -> Result<ResourceSpec, BackendError> {
        let trim = |value: String| value.trim().to_owned();
        let spec = ResourceSpec {
            image_label: trim(self.image_label),
            machine_class: trim(self.machine_class),
            zone: trim(self.zone),
            project_id: trim(self.project_id),
            organisation_id: self.organisation_id.map(trim),
            architecture: trim(self.architecture),
            storage: StorageSpec {
                size_gb: self.storage_size_gb,
                volume_type: trim(self.storage_volume_type),
            },
            network: NetworkPlacement {
                subnet_id: self.subnet_id.map(trim),
                security_group_id: self.security_group_id.map(trim),
            },
            credential_ref: self.credential_ref.map(trim),
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// Provider identifier of a created instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceHandle {
    /// Provider specific identifier for the instance.
    pub id: String,
    /// Zone in which the instance was created.
    pub zone: String,
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.id)
    }
}

/// Connection details for reaching an instance once it is ready.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceNetworking {
    /// Public address assigned by the provider.
    pub public_ip: IpAddr,
    /// TCP port for SSH.
    pub ssh_port: u16,
}

/// One health signal reported by the provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HealthStatus {
    /// The check passed.
    Ok,
    /// The check has not completed yet.
    Initializing,
    /// The check failed but may recover.
    Impaired,
    /// The provider reports a permanent failure.
    Failed,
}

impl HealthStatus {
    /// Returns the lowercase label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Initializing => "initializing",
            Self::Impaired => "impaired",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance and system health observed in a single status query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    /// Health of the instance itself.
    pub instance: HealthStatus,
    /// Health of the host system and its reachability.
    pub system: HealthStatus,
}

impl StatusSnapshot {
    /// Builds a snapshot from both signals.
    #[must_use]
    pub const fn new(instance: HealthStatus, system: HealthStatus) -> Self {
        Self { instance, system }
    }

    /// Returns `true` when both signals report ok in this snapshot.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(
            (self.instance, self.system),
            (HealthStatus::Ok, HealthStatus::Ok)
        )
    }

    /// Returns `true` when either signal reports a permanent failure.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.instance, HealthStatus::Failed) || matches!(self.system, HealthStatus::Failed)
    }
}

/// Network details reported for a resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceDetails {
    /// Public address, once one is assigned.
    pub public_ip: Option<IpAddr>,
    /// TCP port for SSH.
    pub ssh_port: u16,
}

/// Errors raised by backends.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum BackendError {
    /// Raised when a spec is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Minimal interface implemented by cloud backends.
pub trait Backend {
    /// Provider specific error type returned by the backend.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Requests a new resource and returns its identifier.
    fn create<'a>(&'a self, spec: &'a ResourceSpec)
    -> BackendFuture<'a, InstanceHandle, Self::Error>;

    /// Queries instance and system health. Returns `None` while the resource
    /// is not yet visible to the status API.
    fn describe_status<'a>(
        &'a self,
        handle: &'a InstanceHandle,
    ) -> BackendFuture<'a, Option<StatusSnapshot>, Self::Error>;

    /// Fetches the network details of the resource.
    fn describe_details<'a>(
        &'a self,
        handle: &'a InstanceHandle,
    ) -> BackendFuture<'a, ResourceDetails, Self::Error>;

    /// Requests termination of the resource.
    fn terminate<'a>(&'a self, handle: &'a InstanceHandle) -> BackendFuture<'a, (), Self::Error>;
}

//! Core library for the `benchferry` benchmark runner.
//!
//! The crate provisions one short-lived cloud instance, waits until both of
//! its health signals report ok, runs an ordered pipeline of remote commands
//! over a shared SSH session and tears the instance down whatever happened
//! (create → wait for readiness → execute → destroy). The backend seam keeps
//! the lifecycle provider agnostic; Scaleway is the shipped implementation.

pub mod backend;
pub mod benchmark;
pub mod config;
pub mod files;
pub mod lifecycle;
pub mod pipeline;
pub mod readiness;
pub mod run;
pub mod scaleway;
pub mod session;
pub mod test_support;

pub use backend::{
    Backend, BackendError, HealthStatus, InstanceHandle, InstanceNetworking, ResourceDetails,
    ResourceSpec, ResourceSpecBuilder, StatusSnapshot,
};
pub use benchmark::{BenchmarkError, BenchmarkOptions, BenchmarkPlan, ResourceClass};
pub use config::{ConfigError, PlacementOverrides, ScalewayConfig};
pub use files::{FileError, read_public_key, write_report};
pub use lifecycle::{LifecycleError, LifecycleManager, LifecycleState, TeardownGuard};
pub use pipeline::{
    ExecutionPipeline, ExecutionResult, PipelineError, PipelineOutcome, PipelineStep,
};
pub use readiness::{
    ReadinessConfig, ReadinessConfigError, ReadinessError, ReadinessPoller, ReadinessPolicy,
};
pub use run::{RunError, RunOrchestrator, RunState};
pub use scaleway::{ScalewayBackend, ScalewayBackendError};
pub use session::{
    CommandRunner, ProcessCommandRunner, SessionConfig, SessionError, SshConnector, SshSession,
    expand_tilde,
};

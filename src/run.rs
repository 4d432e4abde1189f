//! Orchestrates one end-to-end benchmark run.
//!
//! A run provisions a resource, waits for it to become ready, opens an SSH
//! session, executes the pipeline and always tears the resource down once it
//! exists. Teardown goes through the [`TeardownGuard`] returned by
//! provisioning, so it happens exactly once whichever stage fails.

use std::fmt;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::{Backend, ResourceSpec};
use crate::lifecycle::{LifecycleError, LifecycleManager, LifecycleState, TeardownGuard};
use crate::pipeline::{ExecutionPipeline, ExecutionResult, PipelineOutcome};
use crate::readiness::ReadinessError;
use crate::session::{CommandRunner, SessionError, SshConnector};

/// Stage of a run. Each transition is logged.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunState {
    /// Nothing has happened yet.
    Idle,
    /// The resource is being requested.
    Provisioning,
    /// Waiting for both health checks.
    AwaitingReady,
    /// Opening the SSH session.
    Connecting,
    /// Running pipeline steps.
    Executing,
    /// Terminating the resource.
    TearingDown,
    /// The run produced a valid result.
    Completed,
    /// The run ended without a valid result.
    Failed,
}

impl RunState {
    /// Returns the kebab-case label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Provisioning => "provisioning",
            Self::AwaitingReady => "awaiting-ready",
            Self::Connecting => "connecting",
            Self::Executing => "executing",
            Self::TearingDown => "tearing-down",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced while performing a run.
#[derive(Debug, Error)]
pub enum RunError<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Raised when the provider rejects the resource spec. No resource
    /// exists, so nothing was torn down.
    #[error("failed to provision resource: {0}")]
    Provisioning(#[source] BackendError),
    /// Raised when the resource is not ready within the polling bound.
    #[error("{0}")]
    ReadinessTimeout(#[source] ReadinessError<BackendError>),
    /// Raised when the provider reports the resource as failed.
    #[error("{0}")]
    ReadinessFailed(#[source] ReadinessError<BackendError>),
    /// Raised when a status query fails while waiting for readiness.
    #[error("failed to query resource status: {0}")]
    Status(#[source] BackendError),
    /// Raised when the SSH session cannot be established.
    #[error("failed to connect to resource: {0}")]
    Connection(#[source] SessionError),
    /// Raised when a pipeline step fails. Carries the diagnostics of the
    /// failing step.
    #[error("remote step {step} ({name}) failed{}", exit_suffix(.exit_code))]
    RemoteCommand {
        /// 1-based step number.
        step: usize,
        /// Step name.
        name: String,
        /// Remote exit status, absent when the command never produced one.
        exit_code: Option<i32>,
        /// Partial result with the failing step's output.
        result: Box<ExecutionResult>,
    },
    /// Raised when the run was cancelled.
    #[error("run cancelled while {state}")]
    Cancelled {
        /// Stage that was interrupted.
        state: RunState,
    },
    /// Raised when the resource handle was driven out of order.
    #[error("lifecycle error while {state}: {source}")]
    Lifecycle {
        /// Stage that observed the error.
        state: RunState,
        /// Underlying lifecycle error.
        #[source]
        source: LifecycleError<BackendError>,
    },
}

fn exit_suffix(exit_code: &Option<i32>) -> String {
    exit_code.map_or_else(
        || String::from(" without an exit status"),
        |code| format!(" with exit status {code}"),
    )
}

impl<E> RunError<E>
where
    E: std::error::Error + 'static,
{
    /// Stage in which the run failed.
    #[must_use]
    pub const fn failed_state(&self) -> RunState {
        match self {
            Self::Provisioning(_) => RunState::Provisioning,
            Self::ReadinessTimeout(_) | Self::ReadinessFailed(_) | Self::Status(_) => {
                RunState::AwaitingReady
            }
            Self::Connection(_) => RunState::Connecting,
            Self::RemoteCommand { .. } => RunState::Executing,
            Self::Cancelled { state } | Self::Lifecycle { state, .. } => *state,
        }
    }

    /// Returns `true` when the run stopped because of cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    fn from_lifecycle(state: RunState, error: LifecycleError<E>) -> Self {
        match error {
            LifecycleError::Provisioning(source) => Self::Provisioning(source),
            LifecycleError::Readiness(ReadinessError::Provider(source)) => Self::Status(source),
            LifecycleError::Readiness(ReadinessError::Cancelled) => Self::Cancelled { state },
            LifecycleError::Readiness(err @ ReadinessError::Timeout { .. }) => {
                Self::ReadinessTimeout(err)
            }
            LifecycleError::Readiness(err @ ReadinessError::Failed { .. }) => {
                Self::ReadinessFailed(err)
            }
            source => Self::Lifecycle { state, source },
        }
    }
}

/// Executes the run flow using the provided backend and SSH connector.
#[derive(Debug)]
pub struct RunOrchestrator<B, R: CommandRunner> {
    lifecycle: LifecycleManager<B>,
    connector: SshConnector<R>,
}

impl<B, R> RunOrchestrator<B, R>
where
    B: Backend + Send + Sync + 'static,
    R: CommandRunner,
{
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(lifecycle: LifecycleManager<B>, connector: SshConnector<R>) -> Self {
        Self {
            lifecycle,
            connector,
        }
    }

    /// Returns the lifecycle manager.
    #[must_use]
    pub const fn lifecycle(&self) -> &LifecycleManager<B> {
        &self.lifecycle
    }

    /// Runs the end-to-end workflow and returns the pipeline result.
    ///
    /// Provisioning itself is not interrupted by `cancel`, so a resource the
    /// provider is creating is never abandoned without a handle; cancellation
    /// takes effect at the next wait and the run proceeds to teardown.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] naming the failing stage. The resource has been
    /// torn down by the time any error past provisioning is returned.
    pub async fn execute(
        &self,
        spec: &ResourceSpec,
        pipeline: &ExecutionPipeline,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, RunError<B::Error>> {
        let mut state = RunState::Idle;
        advance(&mut state, RunState::Provisioning);

        let mut guard = match self.lifecycle.provision(spec).await {
            Ok(guard) => guard,
            Err(err) => {
                advance(&mut state, RunState::Failed);
                return Err(RunError::from_lifecycle(RunState::Provisioning, err));
            }
        };

        let outcome = self.drive(&mut state, &mut guard, pipeline, cancel).await;

        advance(&mut state, RunState::TearingDown);
        guard.release().await;

        match outcome {
            Ok(result) => {
                advance(&mut state, RunState::Completed);
                Ok(result)
            }
            Err(err) => {
                warn!(failed_state = %err.failed_state(), error = %err, "run failed");
                advance(&mut state, RunState::Failed);
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        state: &mut RunState,
        guard: &mut TeardownGuard<B>,
        pipeline: &ExecutionPipeline,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, RunError<B::Error>> {
        advance(state, RunState::AwaitingReady);
        self.lifecycle
            .await_ready(guard.handle_mut(), cancel)
            .await
            .map_err(|err| RunError::from_lifecycle(RunState::AwaitingReady, err))?;

        advance(state, RunState::Connecting);
        let handle = guard.handle_mut();
        handle
            .transition::<B::Error>(LifecycleState::InUse)
            .map_err(|err| RunError::from_lifecycle(RunState::Connecting, err))?;
        let networking = handle
            .networking::<B::Error>()
            .map_err(|err| RunError::from_lifecycle(RunState::Connecting, err))?
            .clone();
        let session = self
            .connector
            .connect(&networking, cancel)
            .await
            .map_err(|err| -> RunError<B::Error> {
                match err {
                    SessionError::Cancelled => RunError::Cancelled {
                        state: RunState::Connecting,
                    },
                    other => RunError::Connection(other),
                }
            })?;

        advance(state, RunState::Executing);
        let run = pipeline.run(&session, cancel).await;
        if let Err(err) = session.close().await {
            warn!(error = %err, "failed to close ssh session");
        }

        let result = run.result();
        match run.outcome() {
            PipelineOutcome::Success => Ok(result),
            PipelineOutcome::FailedAtStep {
                step,
                name,
                exit_code,
            } => Err(RunError::RemoteCommand {
                step: *step,
                name: name.clone(),
                exit_code: *exit_code,
                result: Box::new(result),
            }),
            PipelineOutcome::Aborted { .. } => Err(RunError::Cancelled {
                state: RunState::Executing,
            }),
        }
    }
}

fn advance(state: &mut RunState, next: RunState) {
    info!(from = %state, to = %next, "run state transition");
    *state = next;
}

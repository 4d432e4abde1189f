//! Resource lifecycle management.
//!
//! The [`LifecycleManager`] creates a resource, waits for it to become ready
//! and terminates it. Every created resource is wrapped in a
//! [`TeardownGuard`] so termination happens exactly once per run, including
//! on paths that never reach an explicit release.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::{Backend, InstanceHandle, InstanceNetworking, ResourceSpec};
use crate::readiness::{ReadinessError, ReadinessPoller};

mod guard;

pub use guard::TeardownGuard;

/// Position of a resource in its lifecycle. Variants are ordered; a handle
/// only ever moves forward.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LifecycleState {
    /// Creation has been requested but not acknowledged.
    Requested,
    /// The provider accepted the request; the resource is booting.
    Provisioning,
    /// Both health checks passed and a public address is known.
    Ready,
    /// A remote session is using the resource.
    InUse,
    /// Termination has been requested.
    Terminating,
    /// The resource is gone (or its termination was requested and logged).
    Terminated,
}

impl LifecycleState {
    /// Returns the kebab-case label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Provisioning => "provisioning",
            Self::Ready => "ready",
            Self::InUse => "in-use",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the provider rejects the resource spec.
    #[error("failed to provision resource: {0}")]
    Provisioning(#[source] E),
    /// Raised when the resource does not become ready.
    #[error(transparent)]
    Readiness(ReadinessError<E>),
    /// Raised when a transition would move a handle backwards or repeat a
    /// state.
    #[error("invalid lifecycle transition for {resource}: {from} -> {to}")]
    InvalidTransition {
        /// Resource the transition was attempted on.
        resource: String,
        /// Current state.
        from: LifecycleState,
        /// Requested state.
        to: LifecycleState,
    },
    /// Raised when a resource is used before it is ready or after teardown
    /// began.
    #[error("resource {resource} is not usable in state {state}")]
    NotUsable {
        /// Resource that was accessed.
        resource: String,
        /// Current state.
        state: LifecycleState,
    },
}

/// Provider identifier, lifecycle state and networking of one resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceHandle {
    instance: InstanceHandle,
    state: LifecycleState,
    networking: Option<InstanceNetworking>,
}

impl ResourceHandle {
    pub(crate) const fn requested(instance: InstanceHandle) -> Self {
        Self {
            instance,
            state: LifecycleState::Requested,
            networking: None,
        }
    }

    /// Provider identifier of the resource.
    #[must_use]
    pub const fn instance(&self) -> &InstanceHandle {
        &self.instance
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Networking details while the resource is usable.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotUsable`] unless the handle is `ready` or
    /// `in-use`.
    pub fn networking<E>(&self) -> Result<&InstanceNetworking, LifecycleError<E>>
    where
        E: std::error::Error + 'static,
    {
        match (&self.networking, self.state) {
            (Some(networking), LifecycleState::Ready | LifecycleState::InUse) => Ok(networking),
            _ => Err(LifecycleError::NotUsable {
                resource: self.instance.to_string(),
                state: self.state,
            }),
        }
    }

    /// Moves the handle to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] unless `next` is strictly
    /// later than the current state.
    pub fn transition<E>(&mut self, next: LifecycleState) -> Result<(), LifecycleError<E>>
    where
        E: std::error::Error + 'static,
    {
        if next <= self.state {
            return Err(LifecycleError::InvalidTransition {
                resource: self.instance.to_string(),
                from: self.state,
                to: next,
            });
        }
        info!(resource = %self.instance, from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
        Ok(())
    }
}

/// Drives resources through their lifecycle using a backend.
#[derive(Debug)]
pub struct LifecycleManager<B> {
    backend: Arc<B>,
    poller: ReadinessPoller,
}

impl<B> LifecycleManager<B>
where
    B: Backend + Send + Sync + 'static,
{
    /// Creates a manager around `backend`.
    #[must_use]
    pub fn new(backend: B, poller: ReadinessPoller) -> Self {
        Self {
            backend: Arc::new(backend),
            poller,
        }
    }

    /// Returns the backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Requests a new resource and wraps it in a teardown guard.
    ///
    /// Nothing needs tearing down when this fails: the provider never
    /// acknowledged a resource.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Provisioning`] when the provider rejects the
    /// spec.
    pub async fn provision(
        &self,
        spec: &ResourceSpec,
    ) -> Result<TeardownGuard<B>, LifecycleError<B::Error>> {
        let instance = self
            .backend
            .create(spec)
            .await
            .map_err(LifecycleError::Provisioning)?;
        let mut handle = ResourceHandle::requested(instance);
        handle.transition(LifecycleState::Provisioning)?;
        Ok(TeardownGuard::new(Arc::clone(&self.backend), handle))
    }

    /// Waits until the resource reports ready and records its address.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Readiness`] when polling times out, the
    /// provider reports a failure, a query fails or `cancel` fires, and
    /// [`LifecycleError::InvalidTransition`] when the handle is not
    /// provisioning.
    pub async fn await_ready(
        &self,
        handle: &mut ResourceHandle,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError<B::Error>> {
        if handle.state() != LifecycleState::Provisioning {
            return Err(LifecycleError::InvalidTransition {
                resource: handle.instance.to_string(),
                from: handle.state(),
                to: LifecycleState::Ready,
            });
        }
        let networking = self
            .poller
            .wait(self.backend.as_ref(), &handle.instance, cancel)
            .await
            .map_err(LifecycleError::Readiness)?;
        handle.networking = Some(networking);
        handle.transition(LifecycleState::Ready)
    }

    /// Terminates the resource. Idempotent; provider failures are logged and
    /// the handle still ends up terminated.
    pub async fn terminate(&self, handle: &mut ResourceHandle) {
        terminate_resource(self.backend.as_ref(), handle).await;
    }
}

pub(crate) async fn terminate_resource<B: Backend>(backend: &B, handle: &mut ResourceHandle) {
    if handle.state == LifecycleState::Terminated {
        return;
    }
    if handle.state < LifecycleState::Terminating {
        handle.state = LifecycleState::Terminating;
    }
    info!(resource = %handle.instance, "requesting termination");
    match backend.terminate(&handle.instance).await {
        Ok(()) => info!(resource = %handle.instance, "termination requested"),
        Err(err) => warn!(
            resource = %handle.instance,
            error = %err,
            "termination request failed; resource may need manual cleanup"
        ),
    }
    handle.state = LifecycleState::Terminated;
    handle.networking = None;
}

//! Scoped teardown bound to a resource handle.

use std::sync::Arc;

use tracing::warn;

use crate::backend::Backend;

use super::{LifecycleState, ResourceHandle, terminate_resource};

/// Owns a provisioned resource for the duration of a run.
///
/// Call [`TeardownGuard::release`] to terminate the resource. A guard dropped
/// without being released (a panic, or a dropped future) schedules the
/// termination on the current Tokio runtime instead. Once termination has
/// been requested the guard never issues a second request, even when the
/// `release` future is dropped before the provider answers.
#[derive(Debug)]
pub struct TeardownGuard<B>
where
    B: Backend + Send + Sync + 'static,
{
    backend: Arc<B>,
    handle: ResourceHandle,
}

impl<B> TeardownGuard<B>
where
    B: Backend + Send + Sync + 'static,
{
    pub(crate) const fn new(backend: Arc<B>, handle: ResourceHandle) -> Self {
        Self { backend, handle }
    }

    /// The guarded handle.
    #[must_use]
    pub const fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// Mutable access for lifecycle transitions.
    pub const fn handle_mut(&mut self) -> &mut ResourceHandle {
        &mut self.handle
    }

    /// Terminates the resource and returns the final handle.
    pub async fn release(mut self) -> ResourceHandle {
        terminate_resource(self.backend.as_ref(), &mut self.handle).await;
        self.handle.clone()
    }
}

impl<B> Drop for TeardownGuard<B>
where
    B: Backend + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.handle.state() >= LifecycleState::Terminating {
            return;
        }

        let resource = self.handle.instance().to_string();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            warn!(%resource, "teardown guard dropped before release; terminating in background");
            let backend = Arc::clone(&self.backend);
            let mut handle = self.handle.clone();
            runtime.spawn(async move {
                terminate_resource(backend.as_ref(), &mut handle).await;
            });
        } else {
            warn!(%resource, "teardown guard dropped outside a runtime; terminate the resource manually");
        }
    }
}

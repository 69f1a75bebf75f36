//! Guaranteed deregistration of the registered revision.

use std::sync::Arc;

use tracing::{error, info};

use crate::handle::JobHandle;
use crate::service::TaskService;

/// How the final deregistration went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupStatus {
    Deregistered,
    Failed(String),
}

impl CleanupStatus {
    pub fn is_clean(&self) -> bool {
        matches!(self, CleanupStatus::Deregistered)
    }
}

/// An armed registration.
///
/// Created only by a successful registration. [`RegistrationGuard::release`]
/// deregisters the exact handle the service returned; it consumes the guard,
/// so deregistration happens at most once.
pub struct RegistrationGuard {
    service: Arc<dyn TaskService>,
    handle: JobHandle,
    released: bool,
}

impl RegistrationGuard {
    pub(crate) fn arm(service: Arc<dyn TaskService>, handle: JobHandle) -> Self {
        RegistrationGuard {
            service,
            handle,
            released: false,
        }
    }

    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    /// Deregister the revision. Failures are logged and returned as a
    /// status, never as an error.
    pub async fn release(mut self) -> CleanupStatus {
        self.released = true;
        match self.service.deregister(&self.handle).await {
            Ok(()) => {
                info!(handle = %self.handle, "Deregistered task definition");
                CleanupStatus::Deregistered
            }
            Err(e) => {
                error!(handle = %self.handle, error = %e, "Failed to deregister task definition");
                CleanupStatus::Failed(e.to_string())
            }
        }
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        // Async deregistration cannot run here; the lifecycle always releases
        // explicitly, so reaching this means the body panicked.
        if !self.released {
            error!(
                handle = %self.handle,
                "Task definition left registered; deregister it manually"
            );
        }
    }
}

//! Run request for the registered revision.

use tracing::{info, warn};

use crate::error::RunError;
use crate::handle::{DispatchResult, JobHandle};
use crate::service::TaskService;

/// Start the task once. Placement failures are logged and returned, not
/// raised; only a failed call is an error.
pub async fn dispatch(
    service: &dyn TaskService,
    cluster: &str,
    handle: &JobHandle,
) -> Result<DispatchResult, RunError> {
    let result = service
        .run(cluster, handle)
        .await
        .map_err(|source| RunError::Dispatch {
            handle: handle.clone(),
            cluster: cluster.to_string(),
            source,
        })?;

    if result.has_failures() {
        warn!(
            handle = %handle,
            failures = result.failures.len(),
            "Failed to run task"
        );
        for failure in &result.failures {
            warn!(handle = %handle, "{failure}");
        }
    } else {
        info!(
            handle = %handle,
            cluster,
            instances = result.started_instances.len(),
            "Task started"
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeTaskService, Operation};

    #[tokio::test]
    async fn test_started_instances_returned() {
        let service = FakeTaskService::new().with_dispatch(0, 2);
        let result = dispatch(&service, "batch", &JobHandle::new("oneshot", 1))
            .await
            .unwrap();
        assert!(!result.has_failures());
        assert_eq!(result.started_instances.len(), 2);
    }

    #[tokio::test]
    async fn test_placement_failures_are_not_errors() {
        let service = FakeTaskService::new().with_dispatch(2, 0);
        let result = dispatch(&service, "batch", &JobHandle::new("oneshot", 1))
            .await
            .unwrap();
        assert_eq!(result.failures.len(), 2);
        assert!(result.started_instances.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let service = FakeTaskService::new().failing(Operation::Run);
        let err = dispatch(&service, "batch", &JobHandle::new("oneshot", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Dispatch { .. }));
    }
}

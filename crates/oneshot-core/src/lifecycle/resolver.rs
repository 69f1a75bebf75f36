//! Family conflict resolution before registration.

use tracing::{info, warn};

use crate::config::ConflictPolicy;
use crate::error::RunError;
use crate::handle::JobHandle;
use crate::service::TaskService;

/// Make sure no active revision of `family` is left in the way.
///
/// Under [`ConflictPolicy::Replace`] the most recent active revision is
/// deregistered and returned; under [`ConflictPolicy::Abort`] the run fails.
/// Two invocations racing on the same family are not coordinated.
pub async fn resolve_family(
    service: &dyn TaskService,
    family: &str,
    policy: ConflictPolicy,
) -> Result<Option<JobHandle>, RunError> {
    let existing = service
        .latest_active(family)
        .await
        .map_err(|source| RunError::Resolve {
            family: family.to_string(),
            source,
        })?;

    let Some(existing) = existing else {
        return Ok(None);
    };

    match policy {
        ConflictPolicy::Abort => Err(RunError::Conflict {
            family: family.to_string(),
            existing,
        }),
        ConflictPolicy::Replace => {
            warn!(family, existing = %existing, "Task family already active, deregistering it");
            service
                .deregister(&existing)
                .await
                .map_err(|source| RunError::Resolve {
                    family: family.to_string(),
                    source,
                })?;
            info!(handle = %existing, "Deregistered conflicting revision");
            Ok(Some(existing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeTaskService, Operation};

    #[tokio::test]
    async fn test_no_active_family_is_a_no_op() {
        let service = FakeTaskService::new();
        let replaced = resolve_family(&service, "oneshot", ConflictPolicy::Replace)
            .await
            .unwrap();
        assert!(replaced.is_none());
        assert_eq!(service.deregistered(), Vec::<JobHandle>::new());
    }

    #[tokio::test]
    async fn test_replace_deregisters_exactly_once() {
        let service = FakeTaskService::new().with_active(JobHandle::new("oneshot", 7));
        let replaced = resolve_family(&service, "oneshot", ConflictPolicy::Replace)
            .await
            .unwrap();
        assert_eq!(replaced, Some(JobHandle::new("oneshot", 7)));
        assert_eq!(service.deregistered(), vec![JobHandle::new("oneshot", 7)]);
    }

    #[tokio::test]
    async fn test_abort_policy_fails_without_deregistering() {
        let service = FakeTaskService::new().with_active(JobHandle::new("oneshot", 2));
        let err = resolve_family(&service, "oneshot", ConflictPolicy::Abort)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Conflict { .. }));
        assert!(service.deregistered().is_empty());
    }

    #[tokio::test]
    async fn test_other_families_do_not_conflict() {
        let service = FakeTaskService::new().with_active(JobHandle::new("oneshot-nightly", 1));
        let replaced = resolve_family(&service, "oneshot", ConflictPolicy::Abort)
            .await
            .unwrap();
        assert!(replaced.is_none());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_fatal() {
        let service = FakeTaskService::new().failing(Operation::LatestActive);
        let err = resolve_family(&service, "oneshot", ConflictPolicy::Replace)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Resolve { .. }));
    }

    #[tokio::test]
    async fn test_deregistration_failure_is_fatal() {
        let service = FakeTaskService::new()
            .with_active(JobHandle::new("oneshot", 3))
            .failing(Operation::Deregister);
        let err = resolve_family(&service, "oneshot", ConflictPolicy::Replace)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Resolve { .. }));
    }
}

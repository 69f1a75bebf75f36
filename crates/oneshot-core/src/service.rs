//! Orchestration service seam.
//!
//! `TaskService` is the only way the lifecycle talks to the cluster
//! orchestrator. The ECS implementation lives in the `oneshot-ecs` crate;
//! an in-memory fake for tests is provided via the `fakes` module.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::handle::{DispatchResult, InstanceId, JobHandle};
use crate::spec::ConcreteSpecification;

/// Result type for service calls
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Outcome of a single "wait until stopped" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Every instance reached the stopped state.
    Stopped,
    /// The call gave up after its window without a final answer.
    TimedOut,
    /// The call failed; the waiter may retry.
    TransientError(String),
}

/// Cluster orchestration service.
///
/// Guarantees expected from implementations:
/// - `latest_active` only reports revisions whose family equals `family`
///   exactly, most recent first.
/// - `register` returns the revision the service actually created.
/// - `wait_until_stopped` returns within roughly `window`.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Most recent active revision of `family`, if any.
    async fn latest_active(&self, family: &str) -> ServiceResult<Option<JobHandle>>;

    /// Register a task definition and return its handle.
    async fn register(&self, spec: &ConcreteSpecification) -> ServiceResult<JobHandle>;

    /// Start the registered task once on `cluster`.
    async fn run(&self, cluster: &str, handle: &JobHandle) -> ServiceResult<DispatchResult>;

    /// Block until all `instances` stop, for at most `window`.
    async fn wait_until_stopped(
        &self,
        cluster: &str,
        instances: &[InstanceId],
        window: Duration,
    ) -> WaitOutcome;

    /// Deregister a revision.
    async fn deregister(&self, handle: &JobHandle) -> ServiceResult<()>;
}

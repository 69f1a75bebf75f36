//! The oneshot lifecycle.
//!
//! ```text
//! resolve family -> register -> [guard armed] -> run -> wait -> deregister
//!                                                   \-> placement failures -> deregister
//! ```
//!
//! Everything after registration runs as a scoped body. The guard is
//! released once the body returns, whether it finished, failed, timed out or
//! was interrupted, so the registered revision never outlives the run.

pub mod cleanup;
pub mod dispatcher;
pub mod registrar;
pub mod resolver;
pub mod waiter;

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info};

pub use cleanup::{CleanupStatus, RegistrationGuard};
pub use waiter::{CompletionWaiter, WaitReport, WaitState};

use crate::config::RunConfig;
use crate::error::RunError;
use crate::handle::{FailureReason, InstanceId, JobHandle};
use crate::service::TaskService;
use crate::spec::ConcreteSpecification;

/// How the task itself went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every started instance stopped.
    Completed {
        instances: Vec<InstanceId>,
        wait: Option<WaitReport>,
    },
    /// The service could not place the task; nothing was waited on.
    PlacementFailed { failures: Vec<FailureReason> },
}

/// Result of a run that did not hit a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub handle: JobHandle,
    /// Revision deregistered by the conflict resolver, if any.
    pub replaced: Option<JobHandle>,
    pub outcome: RunOutcome,
    pub cleanup: CleanupStatus,
}

/// Runs one task definition through the whole lifecycle.
pub struct Oneshot {
    service: Arc<dyn TaskService>,
    config: RunConfig,
}

impl Oneshot {
    pub fn new(service: Arc<dyn TaskService>, config: RunConfig) -> Self {
        Oneshot { service, config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run to completion with no interrupt source.
    pub async fn run(&self, spec: ConcreteSpecification) -> Result<RunReport, RunError> {
        self.run_until(spec, std::future::pending()).await
    }

    /// Run the lifecycle.
    ///
    /// `interrupt` is watched before registration and again as soon as the
    /// guard is armed, ahead of any dispatch or wait. Registration itself is
    /// never abandoned midway, so a revision the service created is always
    /// known and deregistered. An interrupt fails the run with
    /// [`RunError::Interrupted`] after cleanup.
    pub async fn run_until<I>(
        &self,
        spec: ConcreteSpecification,
        interrupt: I,
    ) -> Result<RunReport, RunError>
    where
        I: Future<Output = ()> + Send,
    {
        self.config.validate()?;
        spec.validate()?;
        tokio::pin!(interrupt);

        let replaced = tokio::select! {
            biased;
            _ = &mut interrupt => {
                error!(family = %self.config.job_name, "Interrupted before registration");
                return Err(RunError::Interrupted);
            }
            resolved = resolver::resolve_family(
                self.service.as_ref(),
                &self.config.job_name,
                self.config.conflict_policy,
            ) => resolved?,
        };

        let spec = registrar::prepare(spec, &self.config)?;
        let guard = registrar::register(self.service.clone(), &spec).await?;
        let handle = guard.handle().clone();

        let result = tokio::select! {
            biased;
            _ = &mut interrupt => {
                error!(handle = %handle, "Interrupted, cleaning up");
                Err(RunError::Interrupted)
            }
            result = self.execute(&handle) => result,
        };

        let cleanup = guard.release().await;

        match result {
            Ok(outcome) => Ok(RunReport {
                handle,
                replaced,
                outcome,
                cleanup,
            }),
            Err(e) => {
                if let CleanupStatus::Failed(reason) = &cleanup {
                    error!(handle = %handle, error = %reason, "Cleanup also failed");
                }
                Err(e)
            }
        }
    }

    /// Dispatch and wait. Runs while the registration guard is armed.
    async fn execute(&self, handle: &JobHandle) -> Result<RunOutcome, RunError> {
        let dispatched =
            dispatcher::dispatch(self.service.as_ref(), &self.config.cluster, handle).await?;

        if dispatched.has_failures() {
            return Ok(RunOutcome::PlacementFailed {
                failures: dispatched.failures,
            });
        }

        if dispatched.started_instances.is_empty() {
            info!(handle = %handle, "No instances started, nothing to wait for");
            return Ok(RunOutcome::Completed {
                instances: Vec::new(),
                wait: None,
            });
        }

        let waiter = CompletionWaiter::new(
            self.service.as_ref(),
            &self.config.cluster,
            self.config.wait_budget,
            self.config.wait_call_cap,
            self.config.backoff,
        );
        let report = waiter.wait(&dispatched.started_instances).await?;
        info!(handle = %handle, "Done, removing the task definition");

        Ok(RunOutcome::Completed {
            instances: dispatched.started_instances,
            wait: Some(report),
        })
    }
}

//! In-memory fake of the orchestration service (testing only)
//!
//! `FakeTaskService` keeps a registry of active revisions, records every
//! call it receives, and can be scripted to report placement failures,
//! failing waits, or failing operations.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::handle::{DispatchResult, FailureReason, InstanceId, JobHandle};
use crate::service::{ServiceResult, TaskService, WaitOutcome};
use crate::spec::ConcreteSpecification;

/// Service operations, used to script failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    LatestActive,
    Register,
    Run,
    Wait,
    Deregister,
}

/// A recorded call with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    LatestActive {
        family: String,
    },
    Register {
        spec: ConcreteSpecification,
    },
    Run {
        cluster: String,
        handle: JobHandle,
    },
    Wait {
        cluster: String,
        instances: Vec<InstanceId>,
        window: Duration,
    },
    Deregister {
        handle: JobHandle,
    },
}

impl ServiceCall {
    pub fn operation(&self) -> Operation {
        match self {
            ServiceCall::LatestActive { .. } => Operation::LatestActive,
            ServiceCall::Register { .. } => Operation::Register,
            ServiceCall::Run { .. } => Operation::Run,
            ServiceCall::Wait { .. } => Operation::Wait,
            ServiceCall::Deregister { .. } => Operation::Deregister,
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    active: Vec<JobHandle>,
    last_revision: HashMap<String, i32>,
    calls: Vec<ServiceCall>,
    wait_outcomes: VecDeque<WaitOutcome>,
}

/// Scriptable in-memory `TaskService`.
#[derive(Debug)]
pub struct FakeTaskService {
    state: Mutex<FakeState>,
    failing: HashSet<Operation>,
    placement_failures: usize,
    started_instances: usize,
    wait_default: WaitOutcome,
    wait_delay: Duration,
    register_delay: Duration,
}

impl Default for FakeTaskService {
    fn default() -> Self {
        FakeTaskService {
            state: Mutex::new(FakeState::default()),
            failing: HashSet::new(),
            placement_failures: 0,
            started_instances: 1,
            wait_default: WaitOutcome::Stopped,
            wait_delay: Duration::ZERO,
            register_delay: Duration::ZERO,
        }
    }
}

impl FakeTaskService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an already active revision.
    pub fn with_active(self, handle: JobHandle) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let last = state.last_revision.entry(handle.family.clone()).or_insert(0);
            *last = (*last).max(handle.revision);
            state.active.push(handle);
        }
        self
    }

    /// Shape of every run result: `failures` placement failures and
    /// `started` started instances.
    pub fn with_dispatch(mut self, failures: usize, started: usize) -> Self {
        self.placement_failures = failures;
        self.started_instances = started;
        self
    }

    /// Outcomes returned by successive wait calls before falling back to
    /// the default.
    pub fn with_wait_outcomes(self, outcomes: impl IntoIterator<Item = WaitOutcome>) -> Self {
        self.state.lock().unwrap().wait_outcomes.extend(outcomes);
        self
    }

    pub fn with_wait_default(mut self, outcome: WaitOutcome) -> Self {
        self.wait_default = outcome;
        self
    }

    /// Time each wait call takes, bounded by its window.
    pub fn with_wait_delay(mut self, delay: Duration) -> Self {
        self.wait_delay = delay;
        self
    }

    /// Time a registration takes before the revision is returned.
    pub fn with_register_delay(mut self, delay: Duration) -> Self {
        self.register_delay = delay;
        self
    }

    /// Make every call of `operation` fail.
    pub fn failing(mut self, operation: Operation) -> Self {
        self.failing.insert(operation);
        self
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Handles passed to `deregister`, in call order.
    pub fn deregistered(&self) -> Vec<JobHandle> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| match c {
                ServiceCall::Deregister { handle } => Some(handle.clone()),
                _ => None,
            })
            .collect()
    }

    /// Documents passed to `register`, in call order.
    pub fn registered(&self) -> Vec<ConcreteSpecification> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| match c {
                ServiceCall::Register { spec } => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }

    /// Revisions currently active.
    pub fn active(&self) -> Vec<JobHandle> {
        self.state.lock().unwrap().active.clone()
    }

    fn record(&self, call: ServiceCall) -> ServiceResult<()> {
        let operation = call.operation();
        self.state.lock().unwrap().calls.push(call);
        if self.failing.contains(&operation) {
            return Err(ServiceError::api(
                operation_name(operation),
                "injected failure",
            ));
        }
        Ok(())
    }
}

fn operation_name(operation: Operation) -> &'static str {
    match operation {
        Operation::LatestActive => "ListTaskDefinitions",
        Operation::Register => "RegisterTaskDefinition",
        Operation::Run => "RunTask",
        Operation::Wait => "WaitUntilTasksStopped",
        Operation::Deregister => "DeregisterTaskDefinition",
    }
}

#[async_trait]
impl TaskService for FakeTaskService {
    async fn latest_active(&self, family: &str) -> ServiceResult<Option<JobHandle>> {
        self.record(ServiceCall::LatestActive {
            family: family.to_string(),
        })?;
        let state = self.state.lock().unwrap();
        Ok(state
            .active
            .iter()
            .filter(|h| h.family == family)
            .max_by_key(|h| h.revision)
            .cloned())
    }

    async fn register(&self, spec: &ConcreteSpecification) -> ServiceResult<JobHandle> {
        self.record(ServiceCall::Register { spec: spec.clone() })?;
        if !self.register_delay.is_zero() {
            tokio::time::sleep(self.register_delay).await;
        }
        let family = spec
            .family
            .clone()
            .ok_or_else(|| ServiceError::api("RegisterTaskDefinition", "family is required"))?;
        let mut state = self.state.lock().unwrap();
        let revision = {
            let last = state.last_revision.entry(family.clone()).or_insert(0);
            *last += 1;
            *last
        };
        let handle = JobHandle::new(family, revision);
        state.active.push(handle.clone());
        Ok(handle)
    }

    async fn run(&self, cluster: &str, handle: &JobHandle) -> ServiceResult<DispatchResult> {
        self.record(ServiceCall::Run {
            cluster: cluster.to_string(),
            handle: handle.clone(),
        })?;
        let failures = (0..self.placement_failures)
            .map(|i| FailureReason {
                arn: Some(format!("arn:aws:ecs:us-east-1:000000000000:container-instance/{i}")),
                reason: Some("RESOURCE:MEMORY".to_string()),
                detail: None,
            })
            .collect();
        let started_instances = (0..self.started_instances)
            .map(|i| {
                InstanceId(format!(
                    "arn:aws:ecs:us-east-1:000000000000:task/{cluster}/{}-{i}",
                    handle.revision
                ))
            })
            .collect();
        Ok(DispatchResult {
            failures,
            started_instances,
        })
    }

    async fn wait_until_stopped(
        &self,
        cluster: &str,
        instances: &[InstanceId],
        window: Duration,
    ) -> WaitOutcome {
        let recorded = self.record(ServiceCall::Wait {
            cluster: cluster.to_string(),
            instances: instances.to_vec(),
            window,
        });

        let delay = self.wait_delay.min(window);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Err(e) = recorded {
            return WaitOutcome::TransientError(e.to_string());
        }
        let scripted = self.state.lock().unwrap().wait_outcomes.pop_front();
        scripted.unwrap_or_else(|| self.wait_default.clone())
    }

    async fn deregister(&self, handle: &JobHandle) -> ServiceResult<()> {
        self.record(ServiceCall::Deregister {
            handle: handle.clone(),
        })?;
        let mut state = self.state.lock().unwrap();
        state.active.retain(|h| h != handle);
        Ok(())
    }
}

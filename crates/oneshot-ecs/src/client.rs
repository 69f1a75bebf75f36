//! ECS client implementing the oneshot task service.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ecs::client::Waiters;
use aws_sdk_ecs::config::Credentials;
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::types::{Compatibility, NetworkMode, SortOrder, TaskDefinitionStatus};
use aws_sdk_ecs::Client;
use aws_smithy_runtime_api::client::waiters::error::WaiterError;
use oneshot_core::{
    ConcreteSpecification, DispatchResult, FailureReason, HandleError, InstanceId, JobHandle,
    ServiceError, ServiceResult, TaskService, WaitOutcome,
};
use tracing::debug;

use crate::convert;

/// Region and credential overrides. Anything left `None` falls back to the
/// SDK's default provider chain.
#[derive(Clone, Default)]
pub struct EcsConfig {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for EcsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcsConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl EcsConfig {
    /// Static credentials when both keys are set. The session token rides
    /// along for temporary credentials.
    pub fn static_credentials(&self) -> Option<Credentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                self.session_token.clone(),
                None,
                "ecs-oneshot",
            )),
            _ => None,
        }
    }
}

fn api_error<E>(operation: &'static str, err: E) -> ServiceError
where
    E: std::error::Error,
{
    ServiceError::api(operation, DisplayErrorContext(&err).to_string())
}

/// Amazon ECS task service.
#[derive(Debug, Clone)]
pub struct EcsService {
    client: Client,
    region: Option<String>,
}

impl EcsService {
    /// Build a client from the environment plus explicit overrides.
    pub async fn connect(config: &EcsConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(credentials) = config.static_credentials() {
            loader = loader.credentials_provider(credentials);
        }
        let sdk_config = loader.load().await;

        EcsService {
            client: Client::new(&sdk_config),
            region: sdk_config.region().map(|r| r.to_string()),
        }
    }

    pub fn from_client(client: Client) -> Self {
        let region = client.config().region().map(|r| r.to_string());
        EcsService { client, region }
    }

    /// Region the client resolved, if any.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

#[async_trait]
impl TaskService for EcsService {
    async fn latest_active(&self, family: &str) -> ServiceResult<Option<JobHandle>> {
        const OP: &str = "ListTaskDefinitions";

        // The family filter is a prefix match; keep only exact families.
        let mut pages = self
            .client
            .list_task_definitions()
            .family_prefix(family)
            .status(TaskDefinitionStatus::Active)
            .sort(SortOrder::Desc)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| api_error(OP, e))?;
            for arn in page.task_definition_arns() {
                let handle: JobHandle = arn.parse().map_err(|e: HandleError| {
                    ServiceError::invalid_response(OP, e.to_string())
                })?;
                if handle.family == family {
                    return Ok(Some(handle));
                }
                debug!(arn = %arn, "Skipping revision of a different family");
            }
        }
        Ok(None)
    }

    async fn register(&self, spec: &ConcreteSpecification) -> ServiceResult<JobHandle> {
        const OP: &str = "RegisterTaskDefinition";

        let family = spec
            .family
            .as_deref()
            .ok_or_else(|| ServiceError::api(OP, "task definition has no family"))?;

        let containers = spec
            .container_definitions
            .iter()
            .map(convert::container_definition)
            .collect::<Result<Vec<_>, _>>()?;

        let compatibilities = spec
            .requires_compatibilities
            .iter()
            .map(|c| Compatibility::from(c.as_str()))
            .collect::<Vec<_>>();

        let output = self
            .client
            .register_task_definition()
            .family(family)
            .set_container_definitions(Some(containers))
            .set_task_role_arn(spec.task_role_arn.clone())
            .set_execution_role_arn(spec.execution_role_arn.clone())
            .set_network_mode(spec.network_mode.as_deref().map(NetworkMode::from))
            .set_requires_compatibilities((!compatibilities.is_empty()).then_some(compatibilities))
            .set_cpu(spec.cpu.clone())
            .set_memory(spec.memory.clone())
            .set_volumes(convert::volumes(&spec.volumes)?)
            .set_placement_constraints(convert::placement_constraints(&spec.placement_constraints))
            .set_runtime_platform(spec.runtime_platform.as_ref().map(convert::runtime_platform))
            .set_ephemeral_storage(
                spec.ephemeral_storage
                    .as_ref()
                    .map(convert::ephemeral_storage)
                    .transpose()?,
            )
            .set_tags(convert::tags(&spec.tags))
            .send()
            .await
            .map_err(|e| api_error(OP, e))?;

        let definition = output
            .task_definition()
            .ok_or_else(|| ServiceError::invalid_response(OP, "no task definition returned"))?;

        Ok(JobHandle::new(
            definition.family().unwrap_or(family),
            definition.revision(),
        ))
    }

    async fn run(&self, cluster: &str, handle: &JobHandle) -> ServiceResult<DispatchResult> {
        let output = self
            .client
            .run_task()
            .cluster(cluster)
            .task_definition(handle.identifier())
            .count(1)
            .send()
            .await
            .map_err(|e| api_error("RunTask", e))?;

        let failures = output
            .failures()
            .iter()
            .map(|f| FailureReason {
                arn: f.arn().map(str::to_string),
                reason: f.reason().map(str::to_string),
                detail: f.detail().map(str::to_string),
            })
            .collect();
        let started_instances = output
            .tasks()
            .iter()
            .filter_map(|t| t.task_arn())
            .map(|arn| InstanceId(arn.to_string()))
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
        let result = self
            .client
            .wait_until_tasks_stopped()
            .cluster(cluster)
            .set_tasks(Some(instances.iter().map(|i| i.0.clone()).collect()))
            .wait(window)
            .await;

        match result {
            Ok(_) => WaitOutcome::Stopped,
            Err(WaiterError::ExceededMaxWait(_)) => WaitOutcome::TimedOut,
            Err(e) => WaitOutcome::TransientError(DisplayErrorContext(&e).to_string()),
        }
    }

    async fn deregister(&self, handle: &JobHandle) -> ServiceResult<()> {
        self.client
            .deregister_task_definition()
            .task_definition(handle.identifier())
            .send()
            .await
            .map_err(|e| api_error("DeregisterTaskDefinition", e))?;
        Ok(())
    }
}

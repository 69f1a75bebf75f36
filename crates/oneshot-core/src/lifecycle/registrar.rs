//! Registration of the concrete task definition.

use std::sync::Arc;

use tracing::{info, warn};

use super::cleanup::RegistrationGuard;
use crate::config::RunConfig;
use crate::error::{RunError, SpecError};
use crate::service::TaskService;
use crate::spec::ConcreteSpecification;

/// Apply the one mutation the lifecycle makes to the document: force the
/// family to the configured job name and, when configured, append the
/// credential environment to the first container.
pub fn prepare(
    mut spec: ConcreteSpecification,
    config: &RunConfig,
) -> Result<ConcreteSpecification, RunError> {
    if let Some(template_family) = spec.family.as_deref() {
        if template_family != config.job_name {
            warn!(
                template_family,
                job_name = %config.job_name,
                "Ignoring family from task definition"
            );
        }
    }
    spec.family = Some(config.job_name.clone());

    if let Some(credentials) = &config.credentials {
        if !spec.inject_environment(credentials.environment()) {
            return Err(RunError::Spec(SpecError::NoContainers));
        }
    }
    Ok(spec)
}

/// Register the prepared document and arm its cleanup.
pub async fn register(
    service: Arc<dyn TaskService>,
    spec: &ConcreteSpecification,
) -> Result<RegistrationGuard, RunError> {
    let family = spec.family.clone().unwrap_or_default();
    info!(family = %family, "Registering task definition");

    let handle = service
        .register(spec)
        .await
        .map_err(|source| RunError::Registration {
            family: family.clone(),
            source,
        })?;

    info!(handle = %handle, "Registered task definition");
    Ok(RegistrationGuard::arm(service, handle))
}

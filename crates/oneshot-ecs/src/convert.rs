//! Conversions from the task definition model into `aws-sdk-ecs` types.

use std::collections::HashMap;

use aws_sdk_ecs::error::BuildError;
use aws_sdk_ecs::types::{
    ContainerCondition, ContainerDefinition as EcsContainerDefinition,
    ContainerDependency as EcsContainerDependency, CpuArchitecture, EfsTransitEncryption,
    EfsVolumeConfiguration as EcsEfsVolumeConfiguration, EphemeralStorage as EcsEphemeralStorage,
    HealthCheck as EcsHealthCheck, HostVolumeProperties as EcsHostVolumeProperties,
    KernelCapabilities as EcsKernelCapabilities, KeyValuePair as EcsKeyValuePair,
    LinuxParameters as EcsLinuxParameters, LogConfiguration as EcsLogConfiguration, LogDriver,
    MountPoint as EcsMountPoint, OsFamily, PortMapping as EcsPortMapping,
    RepositoryCredentials as EcsRepositoryCredentials, RuntimePlatform as EcsRuntimePlatform,
    Secret as EcsSecret, Tag as EcsTag, TaskDefinitionPlacementConstraint,
    TaskDefinitionPlacementConstraintType, TransportProtocol, Ulimit as EcsUlimit, UlimitName,
    Volume as EcsVolume,
};
use oneshot_core::{
    ContainerDefinition, EphemeralStorage, LinuxParameters, PlacementConstraint, RuntimePlatform,
    ServiceError, Tag, Volume,
};

const OP: &str = "RegisterTaskDefinition";

fn build_error(err: BuildError) -> ServiceError {
    ServiceError::api(OP, err.to_string())
}

/// `None` for an empty list so the request leaves the member unset.
fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

fn string_map<'a>(
    entries: impl ExactSizeIterator<Item = (&'a String, &'a String)>,
) -> Option<HashMap<String, String>> {
    if entries.len() == 0 {
        None
    } else {
        Some(entries.map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

fn linux_parameters(params: &LinuxParameters) -> EcsLinuxParameters {
    let capabilities = params.capabilities.as_ref().map(|caps| {
        EcsKernelCapabilities::builder()
            .set_add(non_empty(caps.add.clone()))
            .set_drop(non_empty(caps.drop.clone()))
            .build()
    });
    EcsLinuxParameters::builder()
        .set_capabilities(capabilities)
        .set_init_process_enabled(params.init_process_enabled)
        .set_shared_memory_size(params.shared_memory_size)
        .build()
}

pub fn container_definition(
    container: &ContainerDefinition,
) -> Result<EcsContainerDefinition, ServiceError> {
    let environment = container
        .environment
        .iter()
        .map(|kv| {
            EcsKeyValuePair::builder()
                .name(&kv.name)
                .value(&kv.value)
                .build()
        })
        .collect::<Vec<_>>();

    let secrets = container
        .secrets
        .iter()
        .map(|secret| {
            EcsSecret::builder()
                .name(&secret.name)
                .value_from(&secret.value_from)
                .build()
                .map_err(build_error)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let port_mappings = container
        .port_mappings
        .iter()
        .map(|pm| {
            EcsPortMapping::builder()
                .set_container_port(pm.container_port)
                .set_host_port(pm.host_port)
                .set_protocol(pm.protocol.as_deref().map(TransportProtocol::from))
                .build()
        })
        .collect::<Vec<_>>();

    let mount_points = container
        .mount_points
        .iter()
        .map(|mp| {
            EcsMountPoint::builder()
                .set_source_volume(mp.source_volume.clone())
                .set_container_path(mp.container_path.clone())
                .set_read_only(mp.read_only)
                .build()
        })
        .collect::<Vec<_>>();

    let depends_on = container
        .depends_on
        .iter()
        .map(|dep| {
            EcsContainerDependency::builder()
                .container_name(&dep.container_name)
                .condition(ContainerCondition::from(dep.condition.as_str()))
                .build()
                .map_err(build_error)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ulimits = container
        .ulimits
        .iter()
        .map(|limit| {
            EcsUlimit::builder()
                .name(UlimitName::from(limit.name.as_str()))
                .soft_limit(limit.soft_limit)
                .hard_limit(limit.hard_limit)
                .build()
                .map_err(build_error)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let health_check = match &container.health_check {
        Some(check) => Some(
            EcsHealthCheck::builder()
                .set_command(Some(check.command.clone()))
                .set_interval(check.interval)
                .set_timeout(check.timeout)
                .set_retries(check.retries)
                .set_start_period(check.start_period)
                .build()
                .map_err(build_error)?,
        ),
        None => None,
    };

    let repository_credentials = match &container.repository_credentials {
        Some(creds) => Some(
            EcsRepositoryCredentials::builder()
                .credentials_parameter(&creds.credentials_parameter)
                .build()
                .map_err(build_error)?,
        ),
        None => None,
    };

    let log_configuration = match &container.log_configuration {
        Some(logs) => Some(
            EcsLogConfiguration::builder()
                .log_driver(LogDriver::from(logs.log_driver.as_str()))
                .set_options(string_map(logs.options.iter()))
                .build()
                .map_err(build_error)?,
        ),
        None => None,
    };

    Ok(EcsContainerDefinition::builder()
        .set_name(container.name.clone())
        .set_image(container.image.clone())
        .set_repository_credentials(repository_credentials)
        .set_cpu(container.cpu)
        .set_memory(container.memory)
        .set_memory_reservation(container.memory_reservation)
        .set_essential(container.essential)
        .set_command(non_empty(container.command.clone()))
        .set_entry_point(non_empty(container.entry_point.clone()))
        .set_working_directory(container.working_directory.clone())
        .set_environment(non_empty(environment))
        .set_secrets(non_empty(secrets))
        .set_port_mappings(non_empty(port_mappings))
        .set_mount_points(non_empty(mount_points))
        .set_depends_on(non_empty(depends_on))
        .set_health_check(health_check)
        .set_ulimits(non_empty(ulimits))
        .set_linux_parameters(container.linux_parameters.as_ref().map(linux_parameters))
        .set_docker_labels(string_map(container.docker_labels.iter()))
        .set_log_configuration(log_configuration)
        .build())
}

pub fn volumes(volumes: &[Volume]) -> Result<Option<Vec<EcsVolume>>, ServiceError> {
    let converted = volumes
        .iter()
        .map(|volume| {
            let host = volume.host.as_ref().map(|host| {
                EcsHostVolumeProperties::builder()
                    .set_source_path(host.source_path.clone())
                    .build()
            });
            let efs = match &volume.efs_volume_configuration {
                Some(efs) => Some(
                    EcsEfsVolumeConfiguration::builder()
                        .file_system_id(&efs.file_system_id)
                        .set_root_directory(efs.root_directory.clone())
                        .set_transit_encryption(
                            efs.transit_encryption
                                .as_deref()
                                .map(EfsTransitEncryption::from),
                        )
                        .build()
                        .map_err(build_error)?,
                ),
                None => None,
            };
            Ok(EcsVolume::builder()
                .set_name(volume.name.clone())
                .set_host(host)
                .set_efs_volume_configuration(efs)
                .build())
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;
    Ok(non_empty(converted))
}

pub fn placement_constraints(
    constraints: &[PlacementConstraint],
) -> Option<Vec<TaskDefinitionPlacementConstraint>> {
    non_empty(
        constraints
            .iter()
            .map(|c| {
                TaskDefinitionPlacementConstraint::builder()
                    .set_type(
                        c.constraint_type
                            .as_deref()
                            .map(TaskDefinitionPlacementConstraintType::from),
                    )
                    .set_expression(c.expression.clone())
                    .build()
            })
            .collect(),
    )
}

pub fn runtime_platform(platform: &RuntimePlatform) -> EcsRuntimePlatform {
    EcsRuntimePlatform::builder()
        .set_cpu_architecture(platform.cpu_architecture.as_deref().map(CpuArchitecture::from))
        .set_operating_system_family(
            platform
                .operating_system_family
                .as_deref()
                .map(OsFamily::from),
        )
        .build()
}

pub fn ephemeral_storage(storage: &EphemeralStorage) -> Result<EcsEphemeralStorage, ServiceError> {
    Ok(EcsEphemeralStorage::builder()
        .size_in_gib(storage.size_in_gib)
        .build())
}

pub fn tags(tags: &[Tag]) -> Option<Vec<EcsTag>> {
    non_empty(
        tags.iter()
            .map(|tag| {
                EcsTag::builder()
                    .set_key(tag.key.clone())
                    .set_value(tag.value.clone())
                    .build()
            })
            .collect(),
    )
}

//! Oneshot Core: fire, wait, clean up
//!
//! This crate holds the task lifecycle for `ecs-oneshot`. A run registers a
//! task definition, starts it once on a cluster, waits for the started tasks
//! to stop and always deregisters the definition afterwards.
//!
//! ## Key Components
//!
//! - `SpecificationTemplate`: raw task definition text plus parameters
//! - `ConcreteSpecification`: the parsed `RegisterTaskDefinition` document
//! - `TaskService`: async seam to the orchestration service
//! - `Oneshot`: the lifecycle (resolver, registrar, dispatcher, waiter, cleanup)
//!
//! In-memory fakes for the service live in [`fakes`].

mod config;
mod elapsed;
mod error;
pub mod fakes;
mod handle;
pub mod lifecycle;
pub mod service;
mod spec;
pub mod telemetry;
mod template;

pub use config::{BackoffPolicy, ConflictPolicy, InjectedCredentials, RunConfig};
pub use elapsed::format_elapsed;
pub use error::{HandleError, RunError, ServiceError, SpecError, TemplateError};
pub use handle::{DispatchResult, FailureReason, InstanceId, JobHandle};
pub use lifecycle::{CleanupStatus, Oneshot, RunOutcome, RunReport, WaitReport, WaitState};
pub use service::{ServiceResult, TaskService, WaitOutcome};
pub use spec::{
    ConcreteSpecification, ContainerDefinition, ContainerDependency, EfsVolumeConfiguration,
    EphemeralStorage, HealthCheck, HostVolumeProperties, KernelCapabilities, KeyValuePair,
    LinuxParameters, LogConfiguration, MountPoint, PlacementConstraint, PortMapping,
    RepositoryCredentials, RuntimePlatform, Secret, Tag, Ulimit, Volume,
};
pub use template::{parse_parameter, SpecificationTemplate};

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, RunError>;

//! Error types for oneshot-core

use std::time::Duration;

use thiserror::Error;

use crate::elapsed::format_elapsed;
use crate::handle::JobHandle;

/// Errors raised while materializing a specification template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A placeholder names a parameter that was not supplied
    #[error("template parameter `{0}` is not defined")]
    UndefinedParameter(String),

    /// A `KEY=VALUE` argument could not be split
    #[error("invalid parameter `{0}`: expected KEY=VALUE")]
    InvalidParameter(String),
}

/// Errors raised while parsing a concrete task definition document
#[derive(Error, Debug)]
pub enum SpecError {
    /// The document is not valid `RegisterTaskDefinition` JSON
    #[error("invalid task definition document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document carries no container definitions
    #[error("task definition has no container definitions")]
    NoContainers,

    /// The document uses fields that would not reach the service
    #[error("task definition uses unsupported fields: {}", .0.join(", "))]
    UnsupportedFields(Vec<String>),
}

/// Errors raised while parsing a `family:revision` identifier or ARN
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// No `:revision` suffix
    #[error("`{0}` is not a family:revision identifier")]
    MissingRevision(String),

    /// Nothing before the `:`
    #[error("`{0}` has an empty family")]
    EmptyFamily(String),

    /// The revision is not an integer
    #[error("`{0}` has a non-numeric revision")]
    InvalidRevision(String),
}

/// Errors reported by a [`crate::TaskService`] implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service rejected the call or the transport failed
    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    /// The call succeeded but the response is missing required data
    #[error("{operation} returned an unexpected response: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },
}

impl ServiceError {
    pub fn api(operation: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Api {
            operation,
            message: message.into(),
        }
    }

    pub fn invalid_response(operation: &'static str, message: impl Into<String>) -> Self {
        ServiceError::InvalidResponse {
            operation,
            message: message.into(),
        }
    }
}

/// Fatal errors of a oneshot run
#[derive(Error, Debug)]
pub enum RunError {
    /// Missing or inconsistent run configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Template could not be materialized
    #[error("configuration error: {0}")]
    Template(#[from] TemplateError),

    /// Materialized document is not a usable task definition
    #[error("configuration error: {0}")]
    Spec(#[from] SpecError),

    /// An active family blocks registration under the abort policy
    #[error("a task family with such name ({family}) already exists (active revision {existing})")]
    Conflict { family: String, existing: JobHandle },

    /// Looking up or replacing the existing family failed
    #[error("failed to resolve existing task family {family}: {source}")]
    Resolve {
        family: String,
        #[source]
        source: ServiceError,
    },

    /// The service rejected the task definition
    #[error("failed to register task definition {family}: {source}")]
    Registration {
        family: String,
        #[source]
        source: ServiceError,
    },

    /// The run request itself failed
    #[error("failed to run {handle} on cluster {cluster}: {source}")]
    Dispatch {
        handle: JobHandle,
        cluster: String,
        #[source]
        source: ServiceError,
    },

    /// The completion wait budget was exhausted
    #[error(
        "aborting due to time out, task still running after {} or another error: {last_error}",
        elapsed_display(.elapsed)
    )]
    WaitTimeout {
        elapsed: Duration,
        last_error: String,
    },

    /// The operator interrupted the run
    #[error("interrupted by operator")]
    Interrupted,
}

fn elapsed_display(elapsed: &Duration) -> String {
    format_elapsed(*elapsed)
}

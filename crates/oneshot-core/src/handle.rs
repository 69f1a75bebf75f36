//! Identifiers produced by registration and dispatch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HandleError;

/// A registered task definition revision, rendered as `family:revision`.
///
/// Created once by registration and handed unchanged to both the
/// dispatcher and the cleanup guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub family: String,
    pub revision: i32,
}

impl JobHandle {
    pub fn new(family: impl Into<String>, revision: i32) -> Self {
        JobHandle {
            family: family.into(),
            revision,
        }
    }

    /// The `family:revision` identifier accepted by run and deregister calls.
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.family, self.revision)
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.revision)
    }
}

/// Parses `family:revision` or a full task definition ARN
/// (`arn:aws:ecs:<region>:<account>:task-definition/family:revision`).
impl FromStr for JobHandle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tail = s.rsplit_once('/').map(|(_, tail)| tail).unwrap_or(s);
        let (family, revision) = tail
            .rsplit_once(':')
            .ok_or_else(|| HandleError::MissingRevision(s.to_string()))?;
        if family.is_empty() {
            return Err(HandleError::EmptyFamily(s.to_string()));
        }
        let revision = revision
            .parse::<i32>()
            .map_err(|_| HandleError::InvalidRevision(s.to_string()))?;
        Ok(JobHandle::new(family, revision))
    }
}

/// Identifier of one started task instance (the task ARN on ECS).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A placement failure returned by the run call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub arn: Option<String>,
    pub reason: Option<String>,
    pub detail: Option<String>,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason.as_deref().unwrap_or("unknown reason"))?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        if let Some(arn) = &self.arn {
            write!(f, " [{arn}]")?;
        }
        Ok(())
    }
}

/// Result of a run request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub failures: Vec<FailureReason>,
    pub started_instances: Vec<InstanceId>,
}

impl DispatchResult {
    /// Whether the service reported any placement failure.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

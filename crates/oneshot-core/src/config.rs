//! Run configuration handed to the lifecycle.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::spec::KeyValuePair;

/// Default family name used for registration, run and cleanup.
pub const DEFAULT_JOB_NAME: &str = "oneshot";

/// Default completion wait budget.
pub const DEFAULT_WAIT_BUDGET: Duration = Duration::from_secs(5 * 60);

/// Longest window given to a single wait call (100 polls of 6 seconds).
pub const DEFAULT_WAIT_CALL_CAP: Duration = Duration::from_secs(10 * 60);

/// What to do when an active revision already exists in the target family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Deregister the existing revision and continue.
    #[default]
    Replace,
    /// Fail the run.
    Abort,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::Replace => write!(f, "replace"),
            ConflictPolicy::Abort => write!(f, "abort"),
        }
    }
}

/// Exponential backoff between failed wait calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (0-based): `initial * 2^retry`, capped.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Credentials passed into the task's first container.
#[derive(Clone, PartialEq, Eq)]
pub struct InjectedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl InjectedCredentials {
    pub fn environment(&self) -> Vec<KeyValuePair> {
        vec![
            KeyValuePair::new("AWS_ACCESS_KEY_ID", &self.access_key_id),
            KeyValuePair::new("AWS_SECRET_ACCESS_KEY", &self.secret_access_key),
            KeyValuePair::new("AWS_REGION", &self.region),
        ]
    }
}

impl fmt::Debug for InjectedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectedCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Everything the lifecycle needs to know about one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Target cluster.
    pub cluster: String,
    /// Family used for registration, run and cleanup.
    pub job_name: String,
    /// Total completion wait budget.
    pub wait_budget: Duration,
    /// Upper bound for a single wait call.
    pub wait_call_cap: Duration,
    pub backoff: BackoffPolicy,
    pub conflict_policy: ConflictPolicy,
    /// Injected into the first container when set.
    pub credentials: Option<InjectedCredentials>,
}

impl RunConfig {
    pub fn new(cluster: impl Into<String>) -> Self {
        RunConfig {
            cluster: cluster.into(),
            job_name: DEFAULT_JOB_NAME.to_string(),
            wait_budget: DEFAULT_WAIT_BUDGET,
            wait_call_cap: DEFAULT_WAIT_CALL_CAP,
            backoff: BackoffPolicy::default(),
            conflict_policy: ConflictPolicy::default(),
            credentials: None,
        }
    }

    pub fn with_job_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = job_name.into();
        self
    }

    pub fn with_wait_budget(mut self, budget: Duration) -> Self {
        self.wait_budget = budget;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_credentials(mut self, credentials: InjectedCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if self.cluster.trim().is_empty() {
            return Err(RunError::Configuration("cluster must not be empty".into()));
        }
        if self.job_name.trim().is_empty() {
            return Err(RunError::Configuration("job name must not be empty".into()));
        }
        if self.wait_call_cap.is_zero() {
            return Err(RunError::Configuration(
                "wait call cap must be greater than zero".into(),
            ));
        }
        if let Some(creds) = &self.credentials {
            if creds.access_key_id.is_empty()
                || creds.secret_access_key.is_empty()
                || creds.region.is_empty()
            {
                return Err(RunError::Configuration(
                    "passing credentials requires access key id, secret access key and region"
                        .into(),
                ));
            }
        }
        Ok(())
    }
}

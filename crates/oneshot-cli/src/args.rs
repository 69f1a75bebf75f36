//! Command-line arguments and their translation into run configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use oneshot_core::{parse_parameter, ConflictPolicy, InjectedCredentials, RunConfig};
use oneshot_ecs::EcsConfig;

#[derive(Debug, Parser)]
#[command(name = "ecs-oneshot")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a single ECS task and remove its task definition afterwards", long_about = None)]
pub struct Cli {
    /// Log every ECS request and response
    #[arg(long)]
    pub debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,

    /// Name of the ECS cluster
    #[arg(short, long, env = "ECS_CLUSTER")]
    pub cluster: String,

    /// How long to wait for the task to finish
    #[arg(short = 't', long = "wait", default_value = "5m", value_parser = humantime::parse_duration)]
    pub wait: Duration,

    /// Name of the task family to create in the cluster
    #[arg(short = 'n', long, default_value = "oneshot")]
    pub task_name: String,

    /// JSON file with the task definition describing the containers to run
    #[arg(short = 'j', long)]
    pub task_json: PathBuf,

    /// Pass AWS credentials and region to the first container as environment
    #[arg(long)]
    pub pass_credentials: bool,

    /// Template parameter, may be repeated
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_parameter)]
    pub params: Vec<(String, String)>,

    /// What to do when the task family already has an active revision
    #[arg(long, value_enum, default_value_t = OnConflict::Replace)]
    pub on_conflict: OnConflict,

    /// AWS access key id
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub aws_access_key_id: Option<String>,

    /// AWS secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub aws_secret_access_key: Option<String>,

    /// AWS session token for temporary credentials
    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    pub aws_session_token: Option<String>,

    /// AWS region
    #[arg(long, env = "AWS_REGION")]
    pub aws_region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnConflict {
    /// Deregister the active revision and continue
    Replace,
    /// Stop without registering anything
    Abort,
}

impl From<OnConflict> for ConflictPolicy {
    fn from(value: OnConflict) -> Self {
        match value {
            OnConflict::Replace => ConflictPolicy::Replace,
            OnConflict::Abort => ConflictPolicy::Abort,
        }
    }
}

impl Cli {
    pub fn ecs_config(&self) -> EcsConfig {
        EcsConfig {
            region: self.aws_region.clone(),
            access_key_id: self.aws_access_key_id.clone(),
            secret_access_key: self.aws_secret_access_key.clone(),
            session_token: self.aws_session_token.clone(),
        }
    }

    /// Build the lifecycle configuration. `resolved_region` is the region the
    /// ECS client settled on and is used when none was given explicitly.
    pub fn run_config(&self, resolved_region: Option<&str>) -> Result<RunConfig> {
        let mut config = RunConfig::new(&self.cluster)
            .with_job_name(&self.task_name)
            .with_wait_budget(self.wait)
            .with_conflict_policy(self.on_conflict.into());

        if self.pass_credentials {
            let region = self.aws_region.as_deref().or(resolved_region);
            match (&self.aws_access_key_id, &self.aws_secret_access_key, region) {
                (Some(access_key_id), Some(secret_access_key), Some(region)) => {
                    config = config.with_credentials(InjectedCredentials {
                        access_key_id: access_key_id.clone(),
                        secret_access_key: secret_access_key.clone(),
                        region: region.to_string(),
                    });
                }
                _ => bail!(
                    "--pass-credentials needs an access key id, secret access key and region \
                     (flags or AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY / AWS_REGION)"
                ),
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Cli {
        let mut args = vec!["ecs-oneshot", "-c", "batch", "-j", "task.json"];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.cluster, "batch");
        assert_eq!(cli.task_name, "oneshot");
        assert_eq!(cli.wait, Duration::from_secs(300));
        assert_eq!(cli.on_conflict, OnConflict::Replace);
        assert!(!cli.pass_credentials);
        assert!(cli.params.is_empty());
    }

    #[test]
    fn test_wait_and_name_flags() {
        let cli = parse(&["-t", "1h 30m", "-n", "nightly"]);
        assert_eq!(cli.wait, Duration::from_secs(5400));
        assert_eq!(cli.task_name, "nightly");
    }

    #[test]
    fn test_repeated_params() {
        let cli = parse(&["-p", "image=busybox", "--param", "cmd=echo a=b"]);
        assert_eq!(
            cli.params,
            vec![
                ("image".to_string(), "busybox".to_string()),
                ("cmd".to_string(), "echo a=b".to_string())
            ]
        );
    }

    #[test]
    fn test_malformed_param_is_rejected() {
        let result =
            Cli::try_parse_from(["ecs-oneshot", "-c", "batch", "-j", "t.json", "-p", "oops"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_task_json_is_required() {
        assert!(Cli::try_parse_from(["ecs-oneshot", "-c", "batch"]).is_err());
    }

    #[test]
    fn test_run_config_carries_flags() {
        let cli = parse(&["-n", "etl", "-t", "90s", "--on-conflict", "abort"]);
        let config = cli.run_config(None).unwrap();
        assert_eq!(config.cluster, "batch");
        assert_eq!(config.job_name, "etl");
        assert_eq!(config.wait_budget, Duration::from_secs(90));
        assert_eq!(config.conflict_policy, ConflictPolicy::Abort);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_pass_credentials_uses_explicit_values() {
        let cli = parse(&[
            "--pass-credentials",
            "--aws-access-key-id",
            "AKIAEXAMPLE",
            "--aws-secret-access-key",
            "secret",
            "--aws-region",
            "ap-south-1",
        ]);
        let creds = cli.run_config(Some("us-east-1")).unwrap().credentials.unwrap();
        assert_eq!(creds.access_key_id, "AKIAEXAMPLE");
        assert_eq!(creds.region, "ap-south-1");
    }

    #[test]
    fn test_session_token_reaches_ecs_config() {
        let cli = parse(&[
            "--aws-access-key-id",
            "ASIAEXAMPLE",
            "--aws-secret-access-key",
            "secret",
            "--aws-session-token",
            "token",
        ]);
        let config = cli.ecs_config();
        assert_eq!(config.session_token.as_deref(), Some("token"));
        assert_eq!(
            config
                .static_credentials()
                .unwrap()
                .session_token(),
            Some("token")
        );
    }

    #[test]
    fn test_pass_credentials_falls_back_to_resolved_region() {
        let mut cli = parse(&["--pass-credentials"]);
        cli.aws_access_key_id = Some("AKIAEXAMPLE".to_string());
        cli.aws_secret_access_key = Some("secret".to_string());
        cli.aws_region = None;
        let creds = cli.run_config(Some("us-east-1")).unwrap().credentials.unwrap();
        assert_eq!(creds.region, "us-east-1");
    }

    #[test]
    fn test_pass_credentials_without_keys_fails() {
        let mut cli = parse(&["--pass-credentials"]);
        cli.aws_access_key_id = None;
        cli.aws_secret_access_key = None;
        assert!(cli.run_config(Some("us-east-1")).is_err());
    }
}

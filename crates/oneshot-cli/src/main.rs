//! ecs-oneshot - run a single ECS task and clean up after it
//!
//! Registers the task definition from `--task-json` under `--task-name`,
//! runs it once on `--cluster`, waits up to `--wait` for it to stop and
//! deregisters the definition on every way out.

mod args;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use oneshot_core::telemetry::init_tracing;
use oneshot_core::{
    format_elapsed, ConcreteSpecification, Oneshot, RunOutcome, RunReport, SpecificationTemplate,
};
use oneshot_ecs::EcsService;
use tracing::{info, warn, Level};

use crate::args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level, cli.debug);

    let interrupt = interrupted()?;
    let spec = load_specification(&cli.task_json, &cli.params)?;

    let service = EcsService::connect(&cli.ecs_config()).await;
    let config = cli.run_config(service.region())?;

    let oneshot = Oneshot::new(Arc::new(service), config);
    let report = oneshot
        .run_until(spec, interrupt)
        .await
        .context("Oneshot run failed")?;

    summarize(&report);
    Ok(())
}

/// Read the template file, substitute parameters and parse the result.
fn load_specification(path: &Path, params: &[(String, String)]) -> Result<ConcreteSpecification> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read task definition {}", path.display()))?;
    let template = SpecificationTemplate::new(text).with_parameters(params.iter().cloned());
    ConcreteSpecification::from_template(&template)
        .with_context(|| format!("Failed to prepare task definition {}", path.display()))
}

/// Install the Ctrl-C listener now so a signal that arrives while the
/// client is still connecting is not lost. The returned future resolves on
/// the first interrupt.
#[cfg(unix)]
fn interrupted() -> Result<impl std::future::Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut stream =
        signal(SignalKind::interrupt()).context("Failed to install Ctrl-C handler")?;
    Ok(async move {
        if stream.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    })
}

#[cfg(windows)]
fn interrupted() -> Result<impl std::future::Future<Output = ()>> {
    let mut stream = tokio::signal::windows::ctrl_c().context("Failed to install Ctrl-C handler")?;
    Ok(async move {
        if stream.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    })
}

fn summarize(report: &RunReport) {
    match &report.outcome {
        RunOutcome::Completed { instances, wait } => {
            let waited = wait
                .as_ref()
                .map(|w| format_elapsed(w.waited))
                .unwrap_or_else(|| "0s".to_string());
            info!(
                handle = %report.handle,
                instances = instances.len(),
                waited = %waited,
                "Task finished"
            );
        }
        RunOutcome::PlacementFailed { failures } => {
            warn!(
                handle = %report.handle,
                failures = failures.len(),
                "Task could not be placed"
            );
        }
    }
    if !report.cleanup.is_clean() {
        warn!(handle = %report.handle, "Task definition may still be registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_specification_substitutes_params() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"containerDefinitions":[{{"name":"job","image":"{{{{ image }}}}"}}]}}"#
        )
        .unwrap();

        let spec = load_specification(
            file.path(),
            &[("image".to_string(), "alpine:3.20".to_string())],
        )
        .unwrap();
        assert_eq!(
            spec.container_definitions[0].image.as_deref(),
            Some("alpine:3.20")
        );
    }

    #[test]
    fn test_load_specification_reports_missing_param() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"containerDefinitions":[{{"name":"job","image":"{{{{ image }}}}"}}]}}"#
        )
        .unwrap();

        let err = load_specification(file.path(), &[]).unwrap_err();
        assert!(format!("{err:#}").contains("template parameter `image` is not defined"));
    }

    #[tokio::test]
    async fn test_interrupt_listener_stays_pending_without_signal() {
        let interrupt = interrupted().unwrap();
        let fired = tokio::time::timeout(std::time::Duration::from_millis(20), interrupt).await;
        assert!(fired.is_err());
    }

    #[test]
    fn test_load_specification_missing_file() {
        let err = load_specification(Path::new("/nonexistent/task.json"), &[]).unwrap_err();
        assert!(err.to_string().contains("Failed to read task definition"));
    }
}

//! Bounded completion wait.
//!
//! A single "wait until stopped" call may give up well before the operator's
//! budget runs out, so the waiter keeps re-issuing it and tracks the total
//! elapsed time itself. Failed calls are retried with exponential backoff
//! until the elapsed time strictly exceeds the budget.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::BackoffPolicy;
use crate::elapsed::format_elapsed;
use crate::error::RunError;
use crate::handle::InstanceId;
use crate::service::{TaskService, WaitOutcome};

/// Shortest window handed to a single wait call.
const MIN_CALL_WINDOW: Duration = Duration::from_secs(1);

/// Waiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Polling,
    Stopped,
    Aborted,
}

/// Summary of a completed wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitReport {
    /// Number of wait calls issued.
    pub attempts: u32,
    pub waited: Duration,
}

/// Transition bookkeeping, kept free of I/O so it can be checked directly.
#[derive(Debug, Clone)]
pub(crate) struct WaitProgress {
    budget: Duration,
    state: WaitState,
    attempts: u32,
    last_error: Option<String>,
    final_call: bool,
}

impl WaitProgress {
    pub(crate) fn new(budget: Duration) -> Self {
        WaitProgress {
            budget,
            state: WaitState::Polling,
            attempts: 0,
            last_error: None,
            final_call: false,
        }
    }

    /// Feed the outcome of one call made after `elapsed` total time.
    pub(crate) fn observe(&mut self, outcome: WaitOutcome, elapsed: Duration) -> WaitState {
        debug_assert_eq!(self.state, WaitState::Polling);
        self.attempts += 1;
        self.state = match outcome {
            WaitOutcome::Stopped => WaitState::Stopped,
            WaitOutcome::TimedOut => {
                self.last_error = Some("exceeded max wait time for a single call".to_string());
                self.after_failure(elapsed)
            }
            WaitOutcome::TransientError(message) => {
                self.last_error = Some(message);
                self.after_failure(elapsed)
            }
        };
        self.state
    }

    /// A failure that lands exactly on the budget leaves room for one more
    /// call and no pause; whatever that call returns ends the wait.
    fn after_failure(&mut self, elapsed: Duration) -> WaitState {
        if elapsed > self.budget || self.final_call {
            WaitState::Aborted
        } else {
            self.final_call = elapsed >= self.budget;
            WaitState::Polling
        }
    }
}

/// Waits for started instances against a time budget.
pub struct CompletionWaiter<'a> {
    service: &'a dyn TaskService,
    cluster: &'a str,
    budget: Duration,
    call_cap: Duration,
    backoff: BackoffPolicy,
}

impl<'a> CompletionWaiter<'a> {
    pub fn new(
        service: &'a dyn TaskService,
        cluster: &'a str,
        budget: Duration,
        call_cap: Duration,
        backoff: BackoffPolicy,
    ) -> Self {
        CompletionWaiter {
            service,
            cluster,
            budget,
            call_cap,
            backoff,
        }
    }

    /// Window for the next call: what is left of the budget, bounded by the
    /// per-call cap and floored at [`MIN_CALL_WINDOW`].
    fn call_window(&self, elapsed: Duration) -> Duration {
        self.budget
            .saturating_sub(elapsed)
            .max(MIN_CALL_WINDOW)
            .min(self.call_cap)
    }

    pub async fn wait(&self, instances: &[InstanceId]) -> Result<WaitReport, RunError> {
        let started = Instant::now();
        let mut progress = WaitProgress::new(self.budget);

        info!(
            instances = instances.len(),
            budget = %format_elapsed(self.budget),
            "Waiting for task to finish"
        );

        loop {
            let window = self.call_window(started.elapsed());
            debug!(attempt = progress.attempts + 1, window = %format_elapsed(window), "Wait call");

            let outcome = self
                .service
                .wait_until_stopped(self.cluster, instances, window)
                .await;
            let elapsed = started.elapsed();

            match progress.observe(outcome, elapsed) {
                WaitState::Stopped => {
                    info!(
                        attempts = progress.attempts,
                        waited = %format_elapsed(elapsed),
                        "Task stopped"
                    );
                    return Ok(WaitReport {
                        attempts: progress.attempts,
                        waited: elapsed,
                    });
                }
                WaitState::Aborted => {
                    return Err(RunError::WaitTimeout {
                        elapsed,
                        last_error: progress.last_error.take().unwrap_or_default(),
                    });
                }
                WaitState::Polling => {
                    let pause = self
                        .backoff
                        .delay(progress.attempts - 1)
                        .min(self.budget.saturating_sub(elapsed));
                    warn!(
                        attempt = progress.attempts,
                        waited = %format_elapsed(elapsed),
                        error = progress.last_error.as_deref().unwrap_or_default(),
                        "Task still running, retrying wait"
                    );
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
            }
        }
    }
}

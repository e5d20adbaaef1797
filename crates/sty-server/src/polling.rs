//! Drives a submitted job to a terminal state.
//!
//! Sleeps before every poll, growing the interval additively after each
//! non-terminal tick (500, 700, 900, ... ms, capped at 3 s by default). Gives
//! up with `TimedOut` once the wall-clock budget is spent.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::config::PollConfig;
use crate::error::StyleError;
use crate::job::{JobHandle, JobState, OutputReference};
use crate::replicate::PredictionApi;

/// Sequence of waits between polls
#[derive(Debug, Clone)]
pub struct PollSchedule {
    next: Duration,
    step: Duration,
    max: Duration,
}

impl PollSchedule {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            next: config.initial_interval.min(config.max_interval),
            step: config.interval_step,
            max: config.max_interval,
        }
    }
}

impl Iterator for PollSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = (self.next + self.step).min(self.max);
        Some(current)
    }
}

/// Race `future` against the cancellation signal
pub async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, StyleError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StyleError::Canceled),
        output = future => Ok(output),
    }
}

/// Poll `handle` until the job succeeds, fails, is canceled, or the budget runs out.
///
/// Consumes the handle: a job is never polled again once this returns.
pub async fn wait_for_output<A>(
    api: &A,
    handle: JobHandle,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<OutputReference, StyleError>
where
    A: PredictionApi + ?Sized,
{
    let started = Instant::now();
    let mut state = JobState::Submitted;
    let mut schedule = PollSchedule::new(config);

    for tick in 1..=config.max_ticks {
        let remaining = config.budget.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            break;
        }
        let interval = schedule.next().unwrap_or(config.max_interval).min(remaining);
        cancellable(cancel, tokio::time::sleep(interval)).await?;

        let update = cancellable(cancel, api.poll(&handle)).await??;
        state = state.advance(update.status);

        match &update.last_log_line {
            Some(line) => debug!(tick, status = ?update.status, "Status: {line}"),
            None => debug!(tick, status = ?update.status, "Status update"),
        }

        match state {
            JobState::Succeeded => {
                let output = update.output.ok_or_else(|| {
                    StyleError::Protocol("prediction succeeded without a usable output".into())
                })?;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                info!(tick, elapsed_ms, "Prediction succeeded");
                return Ok(output);
            }
            JobState::Failed => {
                let message = update.error.unwrap_or_else(|| "Unknown error".to_string());
                warn!("Prediction failed: {message}");
                return Err(StyleError::RemoteJobFailed(message));
            }
            JobState::Canceled => {
                warn!("Prediction was canceled");
                return Err(StyleError::RemoteJobCanceled);
            }
            JobState::Submitted | JobState::Processing | JobState::TimedOut => {}
        }

        if started.elapsed() >= config.budget {
            break;
        }
    }

    let elapsed = started.elapsed();
    let state = state.time_out();
    warn!(?state, "Prediction timed out after {} seconds", elapsed.as_secs());
    Err(StyleError::TimedOut { elapsed })
}

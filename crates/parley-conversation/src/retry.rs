// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry engine for one generation.
//!
//! Every backend failure is classified before anything else happens:
//! transient failures are retried on a linear backoff, session-fatal
//! failures park the session as unusable and abort the generation, and
//! terminal failures surface immediately. The attempt budget is a hard
//! ceiling; when it runs out the caller gets `GenerationFailed` carrying
//! the last error.

use std::time::Duration;

use parley_config::model::RetryConfig;
use parley_core::error::BackendError;
use parley_core::types::{Completion, PromptContext};
use parley_core::{ParleyError, ProgressSink};
use parley_session::SessionPool;
use tracing::{debug, warn};

/// What a backend failure means for the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Try again after backoff, same session eligible.
    Retry,
    /// The session is burned and the generation aborts; looping will not
    /// help, an operator has to act.
    SessionFatal,
    /// No retry will help; fail the generation now.
    Terminal,
}

/// Pure classification of a backend error. Unknown errors are treated as
/// transient so a flaky provider does not turn into user-visible failures.
pub fn classify(error: &BackendError) -> Disposition {
    match error {
        BackendError::RateLimited { .. }
        | BackendError::Network(_)
        | BackendError::Other(_) => Disposition::Retry,
        BackendError::QuotaExhausted | BackendError::CredentialsRevoked => {
            Disposition::SessionFatal
        }
        BackendError::EmptyCompletion | BackendError::PromptTooLong => Disposition::Terminal,
    }
}

/// Linear backoff: attempt `n` (0-based) waits `step * (n + 1)`.
pub fn backoff_delay(attempt: u32, step: Duration) -> Duration {
    step * (attempt + 1)
}

fn terminal_error(error: BackendError) -> ParleyError {
    match error {
        BackendError::EmptyCompletion => ParleyError::EmptyCompletion,
        BackendError::PromptTooLong => ParleyError::PromptTooLong,
        other => ParleyError::GenerationFailed {
            attempts: 1,
            source: Box::new(other),
        },
    }
}

/// A finished generation: the completion plus how many attempts failed
/// before it succeeded.
pub struct GenerationOutcome {
    pub completion: Completion,
    pub tries: u32,
}

/// Drives one generation to completion or exhaustion.
///
/// Each attempt acquires a session for the context's model, calls the
/// backend, and returns the session to the pool with the lifecycle
/// consequence of the outcome. `progress` hears about every scheduled
/// retry before its backoff delay elapses. Pool exhaustion is not retried;
/// the caller surfaces it as a busy condition.
pub async fn run_generation(
    pool: &SessionPool,
    config: &RetryConfig,
    ctx: PromptContext,
    progress: &dyn ProgressSink,
) -> Result<GenerationOutcome, ParleyError> {
    let step = Duration::from_millis(config.backoff_step_ms);

    for attempt in 0..config.max_attempts {
        let lease = pool.acquire(&ctx.model).await?;
        match lease.backend().complete(ctx.clone()).await {
            Ok(completion) if completion.text.trim().is_empty() => {
                // A silent success is a terminal failure in disguise. The
                // session itself is healthy; only this generation fails.
                pool.release(lease).await;
                return Err(ParleyError::EmptyCompletion);
            }
            Ok(completion) => {
                pool.release(lease).await;
                debug!(
                    user_id = %ctx.user_id,
                    tries = attempt,
                    "generation succeeded"
                );
                return Ok(GenerationOutcome {
                    completion,
                    tries: attempt,
                });
            }
            Err(error) => {
                pool.fail(lease, &error).await;
                match classify(&error) {
                    Disposition::Terminal => {
                        warn!(user_id = %ctx.user_id, error = %error, "terminal backend error");
                        return Err(terminal_error(error));
                    }
                    Disposition::SessionFatal => {
                        warn!(
                            user_id = %ctx.user_id,
                            error = %error,
                            "session-fatal backend error, aborting generation"
                        );
                        return Err(ParleyError::SessionUnusable {
                            reason: error.to_string(),
                        });
                    }
                    Disposition::Retry => {
                        if attempt + 1 == config.max_attempts {
                            warn!(
                                user_id = %ctx.user_id,
                                attempts = config.max_attempts,
                                error = %error,
                                "generation attempts exhausted"
                            );
                            return Err(ParleyError::GenerationFailed {
                                attempts: config.max_attempts,
                                source: Box::new(error),
                            });
                        }
                        let delay = match &error {
                            // Honor the provider's hint when it is longer
                            // than our own schedule.
                            BackendError::RateLimited {
                                retry_after: Some(hint),
                            } => backoff_delay(attempt, step).max(*hint),
                            _ => backoff_delay(attempt, step),
                        };
                        progress.on_retry(attempt + 1, delay);
                        debug!(
                            user_id = %ctx.user_id,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "retrying generation"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    // max_attempts is validated non-zero at config load.
    Err(ParleyError::Internal("retry budget was zero".to_string()))
}

use std::future::Future;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{backoff::Backoff, error::WorkerError};

/// Runs `operation` until it succeeds, the policy runs out of attempts, the
/// error is not retryable, or `token` is cancelled while waiting.
///
/// Cancellation is only observed between attempts, so an attempt that has
/// been started always runs to completion.
///
/// Without an `is_retryable` classifier every error is returned as-is after
/// the first attempt. Exhausting the policy yields
/// [`WorkerError::RetryLimitExceeded`] carrying the last error as its source.
pub async fn retry_with_backoff<F, Fut, T>(
    token: &CancellationToken,
    backoff: &dyn Backoff,
    mut operation: F,
    is_retryable: Option<fn(&WorkerError) -> bool>,
) -> Result<T, WorkerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WorkerError>>,
{
    let mut last_error = None;

    while backoff.should_continue() {
        let attempt = backoff.attempts();

        let err = match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(attempt, "Retry succeeded");
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if !is_retryable.is_some_and(|retryable| retryable(&err)) {
            debug!(attempt, error = %err, "Operation failed with a non-retryable error");
            return Err(err);
        }

        let delay = backoff.wait();

        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, backing off"
        );

        last_error = Some(Box::new(err));

        tokio::select! {
            _ = token.cancelled() => return Err(WorkerError::Cancelled),
            _ = sleep(delay) => {}
        }
    }

    let attempts = backoff.attempts();
    warn!(attempts, "Retry failed after exhausting all attempts");

    Err(WorkerError::RetryLimitExceeded {
        attempts,
        source: last_error,
    })
}

pub fn validate_device_token(token: &str) -> Result<(), WorkerError> {
    if token.is_empty() {
        return Err(WorkerError::invalid("Device token cannot be empty"));
    }

    if token.len() < 20 {
        return Err(WorkerError::invalid(
            "Device token too short (minimum 20 characters)",
        ));
    }

    if token.len() > 200 {
        return Err(WorkerError::invalid(
            "Device token too long (maximum 200 characters)",
        ));
    }

    let valid_chars = token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ':' || c == '.');

    if !valid_chars {
        return Err(WorkerError::invalid(
            "Device token contains invalid characters",
        ));
    }

    Ok(())
}

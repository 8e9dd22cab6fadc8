//! Retry with a fixed, cancellable delay
//!
//! Used by the track fetcher for transient network failures. The delay between
//! attempts is an async sleep raced against a [`CancellationToken`], so a
//! shutdown or an aborted import never waits out the remaining delay and no
//! worker thread is blocked.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Attempt budget and spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts (at least 1)
    pub max_attempts: u32,
    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Single attempt, no delay
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Sleep for `delay` unless cancelled first
///
/// Returns `false` if the token was cancelled before the delay elapsed.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Run `operation` until it succeeds, fails fatally, or the budget runs out
///
/// **Algorithm:**
/// 1. Attempt operation (the closure receives the 1-based attempt number)
/// 2. If successful, return result
/// 3. If the error is not retryable, return it immediately
/// 4. If attempts remain: log WARN, wait `delay` (cancellable), retry
/// 5. Otherwise, or when cancelled during the wait, return the last error
pub async fn retry_with_delay<F, Fut, T, E, R>(
    operation_name: &str,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let err = match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }

        if attempt >= policy.max_attempts {
            tracing::warn!(
                operation = operation_name,
                attempt,
                error = %err,
                "Giving up: retry budget exhausted"
            );
            return Err(err);
        }

        tracing::warn!(
            operation = operation_name,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = policy.delay.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying"
        );

        if !sleep_or_cancel(policy.delay, cancel).await {
            tracing::info!(operation = operation_name, attempt, "Retry cancelled");
            return Err(err);
        }
    }
}

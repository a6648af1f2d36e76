//! Retry orchestration with exponential backoff, plus the network-error
//! classifier used to pick user-facing failure messages.
//!
//! The orchestrator knows nothing about side effects: the operation is
//! re-invoked verbatim, so callers must only wrap idempotent work.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Message substrings that mark an error as connectivity-related.
pub const NETWORK_ERROR_MARKERS: &[&str] = &["network", "fetch", "connection", "timeout"];

/// Error codes that mark an error as connectivity-related.
pub const NETWORK_ERROR_CODES: &[&str] = &["NETWORK_ERROR", "ECONNREFUSED"];

pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error. Please check your connection and try again.";

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of invocations, including the first. Always at least 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt `attempt` (1-based), before the next one.
    /// 1s, 2s, 4s ... with the default policy.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.max(0.0).powi(exponent);
        Duration::try_from_secs_f64(self.delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Runs `operation` under `policy`, returning the first success or the error
/// of the final attempt.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    with_retry_notify(policy, operation, |_, _| {}).await
}

/// Like [`with_retry`], but calls `on_retry(attempt, &error)` before every
/// retry. The observer is never called after the last attempt and cannot
/// change control flow.
pub async fn with_retry_notify<F, Fut, T, E, N>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    N: FnMut(u32, &E),
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => {
                error!(
                    attempt,
                    max_attempts,
                    error = %err,
                    "Operation failed after all retry attempts"
                );
                return Err(err);
            }
            Err(err) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Operation failed, retrying after backoff"
                );
                on_retry(attempt, &err);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Returns true when an error looks like a connectivity failure: its message
/// mentions one of [`NETWORK_ERROR_MARKERS`], it carries one of
/// [`NETWORK_ERROR_CODES`], or the host reports no connectivity.
pub fn is_network_error(message: &str, code: Option<&str>, online: bool) -> bool {
    if !online {
        return true;
    }
    if code.is_some_and(|c| NETWORK_ERROR_CODES.contains(&c)) {
        return true;
    }
    let message = message.to_lowercase();
    NETWORK_ERROR_MARKERS.iter().any(|m| message.contains(m))
}

/// Picks the message shown to a user for a failed operation.
pub fn user_facing_message(message: &str, code: Option<&str>, online: bool) -> String {
    if is_network_error(message, code, online) {
        NETWORK_ERROR_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

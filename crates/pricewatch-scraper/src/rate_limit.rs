//! Retry with exponential backoff for transient fetch failures.
//!
//! Vendor storefronts throttle aggressively. A 429, a 5xx, or a dropped
//! connection is retried after a growing delay; anything that retrying
//! cannot fix (404, robot check, missing markup) is returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Returns `true` if `err` is worth another attempt after a backoff delay.
///
/// Retriable:
/// - [`ScraperError::RateLimited`]: HTTP 429.
/// - [`ScraperError::Http`]: network-level failure (reset, timeout, TLS).
/// - [`ScraperError::UnexpectedStatus`] with a 5xx status.
///
/// Everything else is returned to the caller on the first occurrence.
fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::RateLimited { .. } | ScraperError::Http(_) => true,
        ScraperError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Executes `operation`, retrying transient errors up to `max_retries` extra
/// times.
///
/// The wait before retry `n` (1-based) is `backoff_base_secs * 2^(n-1)`
/// seconds. With `max_retries = 2` the operation runs at most 3 times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retriable(&err) || attempt >= max_retries => return Err(err),
            Err(err) => err,
        };

        // Cap the shift so extreme configs saturate instead of overflowing.
        let delay_secs = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
        tracing::warn!(
            attempt,
            max_retries,
            delay_secs,
            error = %err,
            "transient fetch error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        attempt += 1;
    }
}

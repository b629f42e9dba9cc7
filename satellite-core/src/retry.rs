//! Exponential backoff: on a transient failure, sleep
//! `2^(attempt+1)` seconds, up to a cap of 10 attempts, then surface the
//! error. Wraps an operation closure in a policy object rather than
//! inlining the retry loop at every call site.

use crate::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Maximum retry attempts before a transient error is surfaced to the
/// caller.
pub const MAX_ATTEMPTS: u32 = 10;

/// `2^(attempt+1)` seconds (attempt is 0-indexed: the first retry sleeps
/// 2s, not 1s).
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let seconds = 2u64.saturating_pow(attempt + 1);
    Duration::from_secs(seconds)
}

/// A uniform jitter in `[0, avg_sleep_time]`, used between successive
/// rate-limited remote calls, used for metadata-plugin pacing.
#[must_use]
pub fn jitter(avg_sleep_time: f64) -> Duration {
    let frac = rand::random::<f64>().clamp(0.0, 1.0);
    Duration::from_secs_f64(avg_sleep_time * frac)
}

/// Run `operation` until it succeeds, a non-recoverable error is returned,
/// or `MAX_ATTEMPTS` is exhausted.
///
/// Non-recoverable errors (per [`Error::is_recoverable`]) are returned
/// immediately without sleeping — this is how "duplicate-benign" (409),
/// "not-found-remote" (404) and "fatal" (401) results skip the backoff loop
/// entirely.
pub async fn with_backoff<F, T, Fut>(label: &str, mut operation: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_recoverable() && attempt < MAX_ATTEMPTS => {
                let delay = backoff_delay(attempt);
                warn!(
                    operation = label,
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "transient failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_matches_spec_formula() {
        assert_eq!(backoff_delay(0), Duration::from_secs(2));
        assert_eq!(backoff_delay(1), Duration::from_secs(4));
        assert_eq!(backoff_delay(9), Duration::from_secs(1024));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let mut calls = 0u32;
        let result: Result<(), Error> = with_backoff("test", || {
            calls += 1;
            async { Err(Error::Transient("boom".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, MAX_ATTEMPTS + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_recoverable_errors_do_not_retry() {
        let mut calls = 0u32;
        let result: Result<(), Error> = with_backoff("test", || {
            calls += 1;
            async { Err(Error::NotFoundRemote("gone".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}

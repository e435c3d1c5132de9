// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded retry with exponential backoff for engine round trips.
//!
//! Only errors that report themselves as [`Transient`] are retried. A
//! rejected command (bad syntax, unknown index) fails on the first attempt.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use redisvl::transport::RetryConfig;
//!
//! let connect = RetryConfig::connect();
//! assert_eq!(connect.attempts, 5);
//! assert_eq!(connect.delay_after(1), Duration::from_millis(200));
//! assert_eq!(connect.delay_after(2), Duration::from_millis(400));
//!
//! assert_eq!(RetryConfig::query().with_attempts(0).attempts, 1);
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

/// Errors that may succeed if the same call is made again
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for redis::RedisError {
    fn is_transient(&self) -> bool {
        self.is_io_error()
            || self.is_connection_dropped()
            || self.is_connection_refusal()
            || self.is_timeout()
    }
}

/// Backoff schedule for one kind of round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, first call included. Never below 1.
    pub attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::connect()
    }
}

impl RetryConfig {
    /// Opening the connection: 5 attempts, about 3 seconds in total.
    #[must_use]
    pub fn connect() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Read-only commands (FT.SEARCH, FT._LIST).
    #[must_use]
    pub fn query() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(500),
            factor: 2.0,
        }
    }

    #[must_use]
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Pause after the `failed`-th failed attempt (1-based)
    pub fn delay_after(&self, failed: usize) -> Duration {
        let exponent = failed.saturating_sub(1).min(32) as i32;
        let delay = self.initial_delay.as_secs_f64() * self.factor.powi(exponent);
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay.max(0.0))
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of
/// attempts. The last error is returned unchanged.
pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let attempts = config.attempts.max(1);
    let mut failed = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if failed > 0 {
                    debug!(operation = operation_name, failed, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        failed += 1;
        if !err.is_transient() || failed >= attempts {
            return Err(err);
        }

        let delay = config.delay_after(failed);
        warn!(
            operation = operation_name,
            attempt = failed,
            of = attempts,
            error = %err,
            ?delay,
            "Transient failure, retrying"
        );
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum FakeError {
        Dropped,
        Rejected,
    }

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Transient for FakeError {
        fn is_transient(&self) -> bool {
            matches!(self, FakeError::Dropped)
        }
    }

    fn fast(attempts: usize) -> RetryConfig {
        RetryConfig {
            attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            factor: 2.0,
        }
    }

    async fn run(
        config: &RetryConfig,
        failures: Vec<FakeError>,
    ) -> (Result<u32, FakeError>, usize) {
        let calls = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(parking_lot::Mutex::new(failures.into_iter()));
        let result = retry("fake", config, || {
            let calls = calls.clone();
            let failures = failures.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                match failures.lock().next() {
                    Some(err) => Err(err),
                    None => Ok(7),
                }
            }
        })
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_first_try() {
        let (result, calls) = run(&fast(3), vec![]).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (result, calls) = run(&fast(3), vec![FakeError::Dropped, FakeError::Dropped]).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let failures = vec![FakeError::Dropped, FakeError::Dropped, FakeError::Dropped];
        let (result, calls) = run(&fast(2), failures).await;
        assert!(matches!(result, Err(FakeError::Dropped)));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let (result, calls) = run(&fast(5), vec![FakeError::Rejected]).await;
        assert!(matches!(result, Err(FakeError::Rejected)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_backoff_schedule() {
        let config = RetryConfig {
            attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            factor: 2.0,
        };
        assert_eq!(config.delay_after(1), Duration::from_secs(1));
        assert_eq!(config.delay_after(2), Duration::from_secs(2));
        assert_eq!(config.delay_after(3), Duration::from_secs(4));
        assert_eq!(config.delay_after(4), Duration::from_secs(5));
        assert_eq!(config.delay_after(1000), Duration::from_secs(5));
    }

    #[test]
    fn test_presets() {
        assert_eq!(RetryConfig::default(), RetryConfig::connect());
        assert_eq!(RetryConfig::query().attempts, 3);
        assert_eq!(RetryConfig::connect().with_attempts(0).attempts, 1);
    }
}

//! Bounded retry with exponential backoff.
//!
//! Classification ([`RetryClass::of`]) and the retry loop ([`execute`]) are
//! separate so each can be tested on its own. Delays are `2^attempt * base`,
//! with a longer base for rate limiting than for transient faults. The loop
//! only suspends the calling task, so concurrent searches back off
//! independently.

use crate::error::ApiError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How a failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Rethrow immediately.
    Terminal,
    /// HTTP 429: back off on the rate-limit base.
    RateLimited,
    /// Network faults, 5xx, 401 and anything unclassified.
    Transient,
}

impl RetryClass {
    pub fn of(error: &ApiError) -> Self {
        match error {
            ApiError::Validation(_) | ApiError::InvalidResponse(_) => Self::Terminal,
            ApiError::Network(_) => Self::Transient,
            ApiError::Http { status, .. } => match status {
                429 => Self::RateLimited,
                401 => Self::Transient,
                400..=499 => Self::Terminal,
                _ => Self::Transient,
            },
            // Credential rejection will not fix itself; a failed transport or
            // an overloaded token endpoint might.
            ApiError::Authentication { source, status, .. } => match (source, status) {
                (Some(_), _) => Self::Transient,
                (None, Some(429)) => Self::RateLimited,
                (None, Some(status)) if *status >= 500 => Self::Transient,
                _ => Self::Terminal,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub rate_limit_base: Duration,
    pub transient_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_base: Duration::from_millis(2000),
            transient_base: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_bases(mut self, rate_limit_base: Duration, transient_base: Duration) -> Self {
        self.rate_limit_base = rate_limit_base;
        self.transient_base = transient_base;
        self
    }

    /// Delay before the attempt following `attempt` (zero-based), or `None`
    /// when the error must be rethrown.
    pub fn delay_for(&self, error: &ApiError, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts.max(1) {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt);
        match RetryClass::of(error) {
            RetryClass::Terminal => None,
            RetryClass::RateLimited => Some(self.rate_limit_base.saturating_mul(factor)),
            RetryClass::Transient => Some(self.transient_base.saturating_mul(factor)),
        }
    }
}

/// Runs `op` until it succeeds, fails terminally, or attempts run out.
///
/// The last error is returned unchanged so callers can still classify it.
pub async fn execute<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => match policy.delay_for(&error, attempt) {
                Some(delay) => {
                    warn!(
                        "Attempt {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    debug!("Giving up after {} attempt(s): {}", attempt + 1, error);
                    return Err(error);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn http(status: u16) -> ApiError {
        ApiError::Http { status, body: None }
    }

    #[test]
    fn test_classification() {
        assert_eq!(RetryClass::of(&http(429)), RetryClass::RateLimited);
        assert_eq!(RetryClass::of(&http(401)), RetryClass::Transient);
        assert_eq!(RetryClass::of(&http(500)), RetryClass::Transient);
        assert_eq!(RetryClass::of(&http(503)), RetryClass::Transient);
        for status in [400, 403, 404, 422] {
            assert_eq!(RetryClass::of(&http(status)), RetryClass::Terminal);
        }
        assert_eq!(
            RetryClass::of(&ApiError::invalid_response("not an array")),
            RetryClass::Terminal
        );
        assert_eq!(
            RetryClass::of(&ApiError::validation("empty origin")),
            RetryClass::Terminal
        );
    }

    #[test]
    fn test_authentication_classification() {
        assert_eq!(
            RetryClass::of(&ApiError::authentication("rejected", Some(401))),
            RetryClass::Terminal
        );
        assert_eq!(
            RetryClass::of(&ApiError::authentication("missing credentials", None)),
            RetryClass::Terminal
        );
        assert_eq!(
            RetryClass::of(&ApiError::authentication("overloaded", Some(503))),
            RetryClass::Transient
        );
        assert_eq!(
            RetryClass::of(&ApiError::authentication("slow down", Some(429))),
            RetryClass::RateLimited
        );
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(&http(429), 0), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(&http(429), 1), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_for(&http(500), 0), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(&http(500), 1), Some(Duration::from_millis(1000)));
        // Final attempt never schedules a delay.
        assert_eq!(policy.delay_for(&http(429), 2), None);
        assert_eq!(policy.delay_for(&http(500), 2), None);

        let longer = RetryPolicy::new(4);
        assert_eq!(longer.delay_for(&http(429), 2), Some(Duration::from_secs(8)));
        assert_eq!(longer.delay_for(&http(502), 2), Some(Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result = execute(&RetryPolicy::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result: Result<(), _> = execute(&RetryPolicy::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(http(429))
        })
        .await;

        assert!(matches!(result, Err(ApiError::Http { status: 429, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(6000));
        assert!(start.elapsed() < Duration::from_millis(14000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = execute(&RetryPolicy::default(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(http(503))
            } else {
                Ok("offers")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "offers");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_not_retried() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result: Result<(), _> = execute(&RetryPolicy::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(http(404))
        })
        .await;

        assert!(matches!(result, Err(ApiError::Http { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute(&RetryPolicy::new(0), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(http(500))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

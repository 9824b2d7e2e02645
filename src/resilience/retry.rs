//! Retry decorator with exponential backoff + jitter
//!
//! Mirrors `with_retry`/`_calculate_delay` from the Python original
//! (`network_resilience.py`): `delay = min(base * base_ex^(attempt-1), max_delay)`
//! with +/-25% jitter, retrying only the categories the kernel allows.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::Classify;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitCallError};
use crate::resilience::jitter::jittered;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter_fraction: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Delay before the `attempt`-th retry (1-indexed: the delay before the
    /// second call is `delay_for_attempt(1)`).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * self.exponential_base.powi(attempt as i32 - 1);
        let capped = exp.min(self.max_delay.as_secs_f64());
        jittered(Duration::from_secs_f64(capped), self.jitter_fraction)
    }
}

/// Result of a retry loop that exhausted its attempts: the last classified
/// error plus how many times `operation` was actually invoked.
#[derive(Debug, Clone)]
pub struct RetryExhausted<E> {
    pub last_error: E,
    pub attempts: u32,
}

/// Execute `operation` with retry, optionally through a circuit breaker.
///
/// Auth, BadRequest, NotFound, and CircuitOpen are never retried (§4.B
/// contract guarantee: "retry never masks Auth errors"). A circuit-open
/// rejection is surfaced immediately without consuming a retry attempt's
/// worth of backoff, since no I/O was attempted.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    policy: &RetryPolicy,
    breaker: Option<&CircuitBreaker>,
) -> Result<T, RetryExhausted<E>>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;

        let result = match breaker {
            Some(cb) => match cb.call(|| operation()).await {
                Ok(value) => Ok(value),
                Err(CircuitCallError::CircuitOpen) => {
                    return Err(RetryExhausted {
                        last_error: E::timeout(),
                        attempts: attempt,
                    });
                }
                Err(CircuitCallError::Timeout) => Err(E::timeout()),
                Err(CircuitCallError::Failed(e)) => Err(e),
            },
            None => operation().await,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) => {
                let category = err.category();
                // Circuit-open above already returned; everything else is
                // subject to the normal retryable-category + attempt-budget check.
                if attempt >= policy.max_attempts || !category.is_retryable() {
                    warn!(attempts = attempt, ?category, "retry loop exhausted");
                    return Err(RetryExhausted {
                        last_error: err,
                        attempts: attempt,
                    });
                }

                let delay = policy.delay_for_attempt(attempt);
                debug!(
                    attempt,
                    ?category,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorCategory, TransportError};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_network_errors_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..RetryPolicy::default()
        };

        let result = with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TransportError::new(ErrorCategory::Network, "boom"))
                    } else {
                        Ok::<_, TransportError>(42)
                    }
                }
            },
            &policy,
            None,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_auth_errors() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), _> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::new(ErrorCategory::Auth, "nope")) }
            },
            &policy,
            None,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn never_exceeds_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..RetryPolicy::default()
        };

        let result: Result<(), _> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::new(ErrorCategory::Network, "boom")) }
            },
            &policy,
            None,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

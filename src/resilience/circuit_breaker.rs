//! Per-service circuit breaker state machine
//!
//! Generic execute-with-timeout, `RwLock`-guarded state. Defaults:
//! `failure_threshold` 5, `recovery_timeout` 60s, `success_threshold` 3,
//! per-call `timeout` 30s.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::errors::{Classify, ErrorCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub success_threshold: u32,
    pub call_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
            call_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count_in_half_open: u32,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count_in_half_open: u32,
    opened_at: Option<Instant>,
    total_calls: u64,
    successful_calls: u64,
    failed_calls: u64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count_in_half_open: 0,
            opened_at: None,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
        }
    }
}

/// Error returned by a call executed through a breaker. `CallFailed` carries
/// the caller-classified category so the retry layer can decide what to do.
#[derive(Debug, Clone)]
pub enum CircuitCallError<E> {
    /// The breaker is open; the backend was never touched.
    CircuitOpen,
    /// The call was cancelled by the per-call timeout.
    Timeout,
    /// The wrapped operation returned an error.
    Failed(E),
}

/// A per-service (or per-instance) circuit breaker. Cheap to clone; state is
/// shared via `Arc`.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Arc<RwLock<Inner>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Arc::new(RwLock::new(Inner::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decide whether a call is allowed right now, transitioning
    /// open -> half_open if the recovery timeout has elapsed.
    async fn should_allow(&self) -> bool {
        let mut inner = self.state.write().await;
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(false);
                if elapsed {
                    info!(breaker = %self.name, "circuit half-opening after recovery timeout");
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count_in_half_open = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    async fn record(&self, success: bool) {
        let mut inner = self.state.write().await;
        inner.total_calls += 1;
        if success {
            inner.successful_calls += 1;
            inner.failure_count = 0;
            if inner.state == CircuitState::HalfOpen {
                inner.success_count_in_half_open += 1;
                if inner.success_count_in_half_open >= self.config.success_threshold {
                    info!(breaker = %self.name, "circuit closing after recovery");
                    inner.state = CircuitState::Closed;
                    inner.success_count_in_half_open = 0;
                    inner.opened_at = None;
                }
            }
        } else {
            inner.failed_calls += 1;
            match inner.state {
                CircuitState::HalfOpen => {
                    warn!(breaker = %self.name, "circuit reopening after half-open failure");
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.success_count_in_half_open = 0;
                }
                CircuitState::Closed => {
                    inner.failure_count += 1;
                    if inner.failure_count >= self.config.failure_threshold {
                        warn!(breaker = %self.name, failures = inner.failure_count, "circuit opening");
                        inner.state = CircuitState::Open;
                        inner.opened_at = Some(Instant::now());
                    }
                }
                CircuitState::Open => {
                    // already open; nothing to do
                }
            }
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.state.read().await.state
    }

    pub async fn stats(&self) -> CircuitBreakerStats {
        let inner = self.state.read().await;
        CircuitBreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count_in_half_open: inner.success_count_in_half_open,
            total_calls: inner.total_calls,
            successful_calls: inner.successful_calls,
            failed_calls: inner.failed_calls,
        }
    }

    pub async fn force_open(&self) {
        let mut inner = self.state.write().await;
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
    }

    pub async fn force_closed(&self) {
        let mut inner = self.state.write().await;
        *inner = Inner::default();
    }

    /// Execute `operation` through the breaker. Fails fast with
    /// `CircuitOpen` without ever polling `operation` when the circuit is open
    /// (invariant 2 in §8: rejection must be sub-millisecond, no I/O).
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitCallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.should_allow().await {
            debug!(breaker = %self.name, "circuit open, failing fast");
            return Err(CircuitCallError::CircuitOpen);
        }

        match tokio::time::timeout(self.config.call_timeout, operation()).await {
            Ok(Ok(value)) => {
                self.record(true).await;
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record(false).await;
                Err(CircuitCallError::Failed(err))
            }
            Err(_elapsed) => {
                self.record(false).await;
                Err(CircuitCallError::Timeout)
            }
        }
    }
}

impl<E> CircuitCallError<E>
where
    E: Classify,
{
    pub fn category(&self) -> ErrorCategory {
        match self {
            CircuitCallError::CircuitOpen => ErrorCategory::CircuitOpen,
            CircuitCallError::Timeout => ErrorCategory::Timeout,
            CircuitCallError::Failed(e) => e.category(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_and_fails_fast() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 3,
                recovery_timeout: Duration::from_millis(50),
                success_threshold: 2,
                call_timeout: Duration::from_secs(1),
            },
        );

        for _ in 0..3 {
            let res: Result<(), CircuitCallError<&str>> =
                cb.call(|| async { Err("boom") }).await;
            assert!(matches!(res, Err(CircuitCallError::Failed("boom"))));
        }

        assert_eq!(cb.state().await, CircuitState::Open);

        let start = Instant::now();
        let res: Result<(), CircuitCallError<&str>> = cb.call(|| async { Ok(()) }).await;
        assert!(matches!(res, Err(CircuitCallError::CircuitOpen)));
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 1,
                recovery_timeout: Duration::from_millis(10),
                success_threshold: 2,
                call_timeout: Duration::from_secs(1),
            },
        );

        let _: Result<(), CircuitCallError<&str>> = cb.call(|| async { Err("x") }).await;
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;

        let _: Result<(), CircuitCallError<&str>> = cb.call(|| async { Ok(()) }).await;
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        let _: Result<(), CircuitCallError<&str>> = cb.call(|| async { Ok(()) }).await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }
}

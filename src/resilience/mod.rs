//! The Resilience Kernel (§4.B): circuit breaking, retry with backoff, and a
//! per-service manager that hands out idempotently-created breakers.

pub mod circuit_breaker;
pub mod jitter;
pub mod manager;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitCallError, CircuitState};
pub use manager::ResilienceManager;
pub use retry::{with_retry, RetryExhausted, RetryPolicy};

use std::future::Future;

use crate::errors::Classify;

/// Run `operation` through both the named breaker and retry policy in one
/// call — the shape every source adapter actually uses.
pub async fn call_with_resilience<T, E, F, Fut>(
    manager: &ResilienceManager,
    service: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let breaker = manager.get_or_create(service).await;
    with_retry(&mut operation, policy, Some(&breaker)).await
}

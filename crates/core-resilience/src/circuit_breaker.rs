//! Circuit Breaker implementation for fault tolerance
//!
//! The circuit breaker prevents cascading failures by failing fast when a
//! dependency is experiencing issues. It has three states:
//! - Closed: normal operation, calls pass through
//! - Open: dependency is unhealthy, calls are rejected immediately
//! - HalfOpen: one probe call is allowed through to test recovery
//!
//! Failure counting is global: any error from the guarded operation counts,
//! regardless of its kind. The breaker re-raises the underlying error on
//! every failed attempt; only rejections while open are its own error
//! ([`ResilienceError::CircuitOpen`]).

use super::error::ResilienceError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// State of the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, calls pass through normally
    Closed,
    /// Circuit is open, calls are rejected immediately
    Open,
    /// Circuit is half-open, the next call probes for recovery
    HalfOpen,
}

/// Configuration for circuit breaker behavior.
///
/// Both knobs are fixed at construction; there is no dynamic
/// reconfiguration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: usize,
    /// How long the circuit stays open before allowing a probe call
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: usize,
    last_failure: Option<Instant>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
        }
    }
}

/// Circuit breaker guarding a single dependency.
///
/// Created once per guarded dependency and shared by cloning: clones share
/// state. While open, `failure_count` stays at or above the threshold and
/// `last_failure` is set; the count only resets on a successful close.
///
/// # Example
/// ```no_run
/// use havoc_core_resilience::{CircuitBreaker, CircuitBreakerConfig, ResilienceError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), ResilienceError> {
///     let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
///
///     let result = breaker.call(|| async {
///         Ok::<_, ResilienceError>(42)
///     }).await?;
///
///     println!("Result: {}", result);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BreakerState::new())),
        }
    }

    /// Create a new circuit breaker with default configuration
    pub fn new_default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Get the current state of the circuit breaker
    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    /// Get the current failure count
    pub async fn failure_count(&self) -> usize {
        self.state.lock().await.failure_count
    }

    /// Reset the circuit breaker to the closed state
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.last_failure = None;
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// While open (and inside the reset window), the operation is rejected
    /// with [`ResilienceError::CircuitOpen`] without being invoked. Once the
    /// window elapses the circuit half-opens and the next call is attempted.
    /// On failure the underlying error is re-raised after the state update.
    pub async fn call<F, Fut, T>(&self, op: F) -> Result<T, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ResilienceError>>,
    {
        self.check_and_update_state().await?;

        match op().await {
            Ok(result) => {
                self.on_success().await;
                Ok(result)
            }
            Err(e) => {
                if e.should_trip_breaker() {
                    self.on_failure().await;
                }
                Err(e)
            }
        }
    }

    /// Check circuit state, transitioning Open -> HalfOpen when the reset
    /// window has elapsed
    async fn check_and_update_state(&self) -> Result<(), ResilienceError> {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let last_failure = state
                    .last_failure
                    .expect("open circuit always has a failure timestamp");
                if last_failure.elapsed() >= self.config.reset_timeout {
                    info!("circuit half-open: probing for recovery");
                    state.state = CircuitState::HalfOpen;
                    Ok(())
                } else {
                    Err(ResilienceError::CircuitOpen)
                }
            }
        }
    }

    async fn on_success(&self) {
        let mut state = self.state.lock().await;

        if state.state != CircuitState::Closed {
            info!("circuit closed: dependency recovered");
        }
        state.state = CircuitState::Closed;
        state.failure_count = 0;
    }

    async fn on_failure(&self) {
        let mut state = self.state.lock().await;

        state.failure_count += 1;
        state.last_failure = Some(Instant::now());

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    warn!(
                        failures = state.failure_count,
                        "circuit opened: failure threshold reached"
                    );
                    state.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!("circuit re-opened: probe call failed");
                state.state = CircuitState::Open;
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failing_breaker(threshold: usize, reset: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout: reset,
        })
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), ResilienceError> {
        breaker
            .call(|| async { Err(ResilienceError::Transient("boom".to_string())) })
            .await
    }

    #[tokio::test]
    async fn test_closed_to_open_at_threshold() {
        let breaker = failing_breaker(3, Duration::from_millis(100));

        for _ in 0..2 {
            assert!(fail(&breaker).await.is_err());
            assert_eq!(breaker.state().await, CircuitState::Closed);
        }

        assert!(fail(&breaker).await.is_err());
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let breaker = failing_breaker(2, Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let _: Result<(), _> = breaker
                .call(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ResilienceError::Transient("boom".to_string()))
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Next call is rejected and the operation is not invoked
        let calls2 = calls.clone();
        let result: Result<(), _> = breaker
            .call(|| async move {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_count_retained_while_open() {
        let breaker = failing_breaker(2, Duration::from_secs(60));
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;

        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(breaker.failure_count().await >= 2);
    }

    #[tokio::test]
    async fn test_half_open_success_closes() {
        let breaker = failing_breaker(2, Duration::from_millis(50));
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(60)).await;

        let result = breaker.call(|| async { Ok::<_, ResilienceError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = failing_breaker(2, Duration::from_millis(50));
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        // Probe fails: circuit re-opens with a fresh window
        assert!(fail(&breaker).await.is_err());
        assert_eq!(breaker.state().await, CircuitState::Open);

        // Immediately after, calls are rejected again
        let result: Result<(), _> = breaker.call(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen)));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count_while_closed() {
        let breaker = failing_breaker(3, Duration::from_millis(100));
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.failure_count().await, 2);

        let _ = breaker.call(|| async { Ok::<_, ResilienceError>(()) }).await;
        assert_eq!(breaker.failure_count().await, 0);
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_underlying_error_is_re_raised() {
        let breaker = failing_breaker(5, Duration::from_millis(100));
        let result: Result<(), _> = breaker
            .call(|| async { Err(ResilienceError::Permanent("auth".to_string())) })
            .await;
        assert!(matches!(result, Err(ResilienceError::Permanent(_))));
    }

    #[tokio::test]
    async fn test_reset() {
        let breaker = failing_breaker(1, Duration::from_secs(60));
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        breaker.reset().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let breaker = failing_breaker(2, Duration::from_secs(60));
        let clone = breaker.clone();

        let _ = fail(&breaker).await;
        let _ = fail(&clone).await;

        assert_eq!(breaker.state().await, CircuitState::Open);
        assert_eq!(clone.state().await, CircuitState::Open);
    }
}

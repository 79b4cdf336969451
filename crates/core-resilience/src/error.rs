//! Error types for resilience operations

use thiserror::Error;

/// Errors that can occur in resilience operations
#[derive(Debug, Error, Clone)]
pub enum ResilienceError {
    /// Circuit breaker is open, rejecting requests without invoking them
    #[error("circuit breaker is open, rejecting requests")]
    CircuitOpen,

    /// Transient dependency failure that may be retried
    #[error("transient error: {0}")]
    Transient(String),

    /// Permanent error that should not be retried
    #[error("permanent error: {0}")]
    Permanent(String),

    /// Malformed payload, fatal to the current operation and never retried
    #[error("validation failed: {0}")]
    Validation(String),

    /// Operation timed out
    #[error("operation timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Retry budget exhausted
    #[error("maximum retries ({0}) exceeded")]
    RetriesExhausted(usize),
}

impl ResilienceError {
    /// Check if this error is transient and can be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ResilienceError::Transient(_) | ResilienceError::Timeout(_)
        )
    }

    /// Check if this error is permanent and should not be retried
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ResilienceError::Permanent(_)
                | ResilienceError::Validation(_)
                | ResilienceError::CircuitOpen
        )
    }

    /// Check if this error should contribute to circuit breaker failure count
    pub fn should_trip_breaker(&self) -> bool {
        !matches!(self, ResilienceError::CircuitOpen)
    }
}

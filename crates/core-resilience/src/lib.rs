//! Havoc Core Resilience: pure-logic fault tolerance primitives
//!
//! # Overview
//!
//! Building blocks for callers that must survive misbehaving dependencies:
//!
//! - **Circuit Breaker**: fails fast after repeated failures, probes for
//!   recovery after a cooldown
//! - **Retry Policy**: bounded re-invocation with exponential backoff,
//!   routing exhausted failures to a dead-letter sink
//! - **Dead-Letter Queue**: bounded quarantine for permanently failed items
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of storage systems,
//! network protocols, or application payloads. The guarded operation is just
//! an async closure; the dead-letter sink is just a trait. Both primitives
//! are independent decorators over a callable and compose in either order.
//!
//! # Usage Example
//!
//! ```no_run
//! use havoc_core_resilience::{CircuitBreaker, CircuitBreakerConfig, ResilienceError};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), ResilienceError> {
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     reset_timeout: Duration::from_secs(10),
//! });
//!
//! let result = breaker.call(|| async {
//!     // Your potentially failing operation
//!     Ok::<_, ResilienceError>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod dead_letter;
pub mod error;
pub mod retry;

// Re-export main types for convenience
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use dead_letter::{DeadLetterQueue, DeadLetterRecord, DeadLetterSink, DeadLetterStats};
pub use error::ResilienceError;
pub use retry::{AttemptOutcome, RetryAttempt, RetryOutcome, RetryPolicy};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use havoc_core_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use super::dead_letter::{DeadLetterQueue, DeadLetterRecord, DeadLetterSink};
    pub use super::error::ResilienceError;
    pub use super::retry::{RetryOutcome, RetryPolicy};
}

/*!
 * Error types for Havoc
 */

use havoc_chaos::ChaosError;
use havoc_core_interface::CloudError;
use havoc_core_resilience::ResilienceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HavocError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Error)]
pub enum HavocError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A cloud collaborator failed
    #[error(transparent)]
    Cloud(#[from] CloudError),

    /// A resilience primitive reported a failure
    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    /// Fault injection failed
    #[error(transparent)]
    Chaos(#[from] ChaosError),

    /// Report could not be written
    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),

    /// Report could not be serialized
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl HavocError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // Fatal errors: bad config or bad chaos parameters
            HavocError::Config(_) | HavocError::Chaos(_) => EXIT_FATAL,
            // Everything else: partial failure
            _ => EXIT_PARTIAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(HavocError::Config("bad".into()).exit_code(), EXIT_FATAL);
        assert_eq!(
            HavocError::Chaos(ChaosError::InvalidProbability(2.0)).exit_code(),
            EXIT_FATAL
        );
        assert_eq!(
            HavocError::Cloud(CloudError::unavailable("storage")).exit_code(),
            EXIT_PARTIAL
        );
    }

    #[test]
    fn test_transparent_display() {
        let err = HavocError::Resilience(ResilienceError::CircuitOpen);
        assert_eq!(err.to_string(), ResilienceError::CircuitOpen.to_string());
    }
}

//! Error types for fault injection

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which service group a fault targets.
///
/// Groups fail and restore independently: an outage on storage never touches
/// messaging, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Storage,
    Messaging,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Storage => f.write_str("storage"),
            ServiceKind::Messaging => f.write_str("messaging"),
        }
    }
}

/// Errors that can occur while setting up or tearing down faults
#[derive(Debug, Error)]
pub enum ChaosError {
    /// A fault is already active on this service; restore it first.
    /// Overlapping faults are rejected rather than stacked or superseded.
    #[error("a fault is already active on the {service} service")]
    FaultAlreadyActive { service: ServiceKind },

    /// Corruption probability must lie in [0.0, 1.0]
    #[error("corruption probability {0} outside [0.0, 1.0]")]
    InvalidProbability(f64),

    /// Chaos-monkey policy failed validation
    #[error("invalid chaos policy: {0}")]
    InvalidPolicy(String),

    /// Report could not be written
    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),

    /// Report could not be serialized
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

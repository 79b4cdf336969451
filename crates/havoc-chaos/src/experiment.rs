//! Experiment log and chaos report
//!
//! Every fault activation appends an entry recording whether the *setup*
//! itself succeeded (not the failures the fault later causes). The log is
//! append-only and flushes to a JSON report on demand.

use crate::ChaosError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

/// The kinds of chaos experiment the harness can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExperimentKind {
    NetworkLatency,
    ServiceFailure,
    HighCpuLoad,
    MemoryPressure,
    DataCorruption,
}

impl ExperimentKind {
    /// All kinds, for uniform random selection
    pub const ALL: [ExperimentKind; 5] = [
        ExperimentKind::NetworkLatency,
        ExperimentKind::ServiceFailure,
        ExperimentKind::HighCpuLoad,
        ExperimentKind::MemoryPressure,
        ExperimentKind::DataCorruption,
    ];
}

impl std::fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExperimentKind::NetworkLatency => "NETWORK_LATENCY",
            ExperimentKind::ServiceFailure => "SERVICE_FAILURE",
            ExperimentKind::HighCpuLoad => "HIGH_CPU_LOAD",
            ExperimentKind::MemoryPressure => "MEMORY_PRESSURE",
            ExperimentKind::DataCorruption => "DATA_CORRUPTION",
        };
        f.write_str(name)
    }
}

/// A single experiment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentLogEntry {
    /// When the experiment was set up
    pub at: DateTime<Utc>,
    /// Experiment kind
    pub kind: ExperimentKind,
    /// Human-readable parameters ("latency 800ms for 15s", ...)
    pub description: String,
    /// Whether the setup itself succeeded
    pub succeeded: bool,
    /// Intended duration of the experiment window, in seconds
    pub duration_secs: f64,
}

/// Append-only, thread-safe experiment log
#[derive(Debug, Clone, Default)]
pub struct ExperimentLog {
    entries: Arc<Mutex<Vec<ExperimentLogEntry>>>,
}

impl ExperimentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(
        &self,
        kind: ExperimentKind,
        description: impl Into<String>,
        succeeded: bool,
        duration: Duration,
    ) {
        let description = description.into();
        info!(%kind, succeeded, %description, "experiment recorded");
        let entry = ExperimentLogEntry {
            at: Utc::now(),
            kind,
            description,
            succeeded,
            duration_secs: duration.as_secs_f64(),
        };
        self.entries
            .lock()
            .expect("experiment log poisoned")
            .push(entry);
    }

    /// Number of entries recorded so far
    pub fn len(&self) -> usize {
        self.entries.lock().expect("experiment log poisoned").len()
    }

    /// Check whether any experiments were recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries
    pub fn snapshot(&self) -> Vec<ExperimentLogEntry> {
        self.entries
            .lock()
            .expect("experiment log poisoned")
            .clone()
    }

    /// Aggregate the log into a report
    pub fn report(&self) -> ChaosReport {
        ChaosReport::from_entries(self.snapshot())
    }
}

/// Per-kind aggregate statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindStats {
    pub kind: ExperimentKind,
    pub executed: usize,
    pub succeeded: usize,
    /// Setup success rate as a percentage
    pub success_rate: f64,
    pub avg_duration_secs: f64,
}

/// Aggregate report over all recorded experiments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaosReport {
    pub generated_at: DateTime<Utc>,
    pub total_experiments: usize,
    pub successful_experiments: usize,
    /// Overall setup success rate as a percentage
    pub success_rate: f64,
    pub by_kind: Vec<KindStats>,
    pub experiments: Vec<ExperimentLogEntry>,
}

impl ChaosReport {
    fn from_entries(entries: Vec<ExperimentLogEntry>) -> Self {
        let total = entries.len();
        let successful = entries.iter().filter(|e| e.succeeded).count();

        let mut grouped: BTreeMap<String, Vec<&ExperimentLogEntry>> = BTreeMap::new();
        for entry in &entries {
            grouped.entry(entry.kind.to_string()).or_default().push(entry);
        }

        let by_kind = grouped
            .into_values()
            .map(|group| {
                let executed = group.len();
                let succeeded = group.iter().filter(|e| e.succeeded).count();
                let total_duration: f64 = group.iter().map(|e| e.duration_secs).sum();
                KindStats {
                    kind: group[0].kind,
                    executed,
                    succeeded,
                    success_rate: succeeded as f64 / executed as f64 * 100.0,
                    avg_duration_secs: total_duration / executed as f64,
                }
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            total_experiments: total,
            successful_experiments: successful,
            success_rate: if total == 0 {
                100.0
            } else {
                successful as f64 / total as f64 * 100.0
            },
            by_kind,
            experiments: entries,
        }
    }

    /// Format a human-readable summary line
    pub fn summary(&self) -> String {
        format!(
            "Chaos: {} experiments | {} succeeded ({:.1}%) | {} kinds exercised",
            self.total_experiments,
            self.successful_experiments,
            self.success_rate,
            self.by_kind.len()
        )
    }

    /// Serialize the report as pretty JSON to `path`
    pub fn write_to(&self, path: &Path) -> Result<(), ChaosError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

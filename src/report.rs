/*!
 * Resilience monitor and soak reports
 *
 * Runs the pipeline end to end in a loop for a bounded window, draining the
 * dead-letter queue between iterations, and aggregates the outcomes into a
 * JSON report. Chaos experiments executed during the window are counted via
 * the injector's experiment log.
 */

use crate::error::Result;
use crate::pipeline::ResilientPipeline;
use chrono::{DateTime, Utc};
use havoc_chaos::ExperimentLog;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Outcome of one soak iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number
    pub iteration: usize,
    pub succeeded: bool,
    pub duration_secs: f64,
    /// Upload attempts made (1 means no retries)
    pub upload_attempts: u32,
    /// Dead letters drained after this iteration
    pub dead_letters_drained: usize,
}

/// Aggregate soak report, serialized as pretty JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceReport {
    pub generated_at: DateTime<Utc>,
    pub total_iterations: usize,
    pub successful_iterations: usize,
    /// Percentage of iterations that completed
    pub success_rate: f64,
    pub avg_duration_secs: f64,
    /// Upload retries across the whole run (attempts beyond the first)
    pub total_retries: u64,
    /// Dead letters drained across the whole run
    pub total_dlq_errors: u64,
    /// Chaos experiments executed during the window
    pub total_chaos_experiments: usize,
    pub iterations: Vec<IterationRecord>,
}

impl ResilienceReport {
    fn from_iterations(iterations: Vec<IterationRecord>, chaos_experiments: usize) -> Self {
        let total = iterations.len();
        let successful = iterations.iter().filter(|i| i.succeeded).count();
        let total_duration: f64 = iterations.iter().map(|i| i.duration_secs).sum();

        Self {
            generated_at: Utc::now(),
            total_iterations: total,
            successful_iterations: successful,
            success_rate: if total == 0 {
                100.0
            } else {
                successful as f64 / total as f64 * 100.0
            },
            avg_duration_secs: if total == 0 {
                0.0
            } else {
                total_duration / total as f64
            },
            total_retries: iterations
                .iter()
                .map(|i| i.upload_attempts.saturating_sub(1) as u64)
                .sum(),
            total_dlq_errors: iterations.iter().map(|i| i.dead_letters_drained as u64).sum(),
            total_chaos_experiments: chaos_experiments,
            iterations,
        }
    }

    /// Format a human-readable summary line
    pub fn summary(&self) -> String {
        format!(
            "Soak: {} iterations | {:.1}% success | {:.3}s avg | {} retries | {} dead letters | {} chaos experiments",
            self.total_iterations,
            self.success_rate,
            self.avg_duration_secs,
            self.total_retries,
            self.total_dlq_errors,
            self.total_chaos_experiments
        )
    }

    /// Serialize the report as pretty JSON to `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Drives repeated pipeline runs and collects the report
pub struct ResilienceMonitor {
    pipeline: Arc<ResilientPipeline>,
    experiments: Option<ExperimentLog>,
}

impl ResilienceMonitor {
    pub fn new(pipeline: Arc<ResilientPipeline>) -> Self {
        Self {
            pipeline,
            experiments: None,
        }
    }

    /// Count experiments from `log` in the final report
    pub fn with_experiment_log(mut self, log: ExperimentLog) -> Self {
        self.experiments = Some(log);
        self
    }

    /// Run the pipeline in a loop until `window` elapses or `cancel` fires,
    /// pausing `pause` between iterations.
    pub async fn run(
        &self,
        window: Duration,
        pause: Duration,
        cancel: &CancellationToken,
    ) -> ResilienceReport {
        let deadline = Instant::now() + window;
        let drain_window = (pause / 2).max(Duration::from_millis(10));
        let mut iterations = Vec::new();

        info!(window_secs = window.as_secs_f64(), "soak starting");

        while Instant::now() < deadline && !cancel.is_cancelled() {
            let outcome = self.pipeline.run_once().await;
            let drained = self.pipeline.drain_dead_letters(drain_window).await;

            let record = IterationRecord {
                iteration: iterations.len() + 1,
                succeeded: outcome.succeeded,
                duration_secs: outcome.duration.as_secs_f64(),
                upload_attempts: outcome.upload_attempts,
                dead_letters_drained: drained,
            };
            info!(
                iteration = record.iteration,
                succeeded = record.succeeded,
                attempts = record.upload_attempts,
                drained,
                "soak iteration finished"
            );
            iterations.push(record);

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancel.cancelled() => break,
            }
        }

        let chaos_experiments = self.experiments.as_ref().map(|l| l.len()).unwrap_or(0);
        let report = ResilienceReport::from_iterations(iterations, chaos_experiments);
        info!("{}", report.summary());
        report
    }
}

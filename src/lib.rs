/*!
 * Havoc: resilience control harness
 *
 * A data pipeline hardened with the `havoc-core-resilience` primitives
 * (circuit breaker, retry with dead-lettering) and exercised by the
 * `havoc-chaos` fault injector. The library wires the pieces together:
 * transaction records and validation, the resilient pipeline itself,
 * background monitors over the cloud collaborators, and the soak monitor
 * that turns repeated runs under chaos into a JSON resilience report.
 *
 * All cloud collaborators are reached through the narrow async contracts in
 * `havoc-core-interface`; the shipped backends are in-memory.
 */

pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod pipeline;
pub mod records;
pub mod report;

pub use config::HavocConfig;
pub use error::{HavocError, Result};
pub use monitor::{BucketMonitor, MetricsSnapshot, MonitorMetrics, QueueMonitor};
pub use pipeline::{QueueDeadLetterSink, ResilientPipeline, RunOutcome};
pub use records::{enrich, generate_sample_data, validate, TransactionRecord};
pub use report::{IterationRecord, ResilienceMonitor, ResilienceReport};

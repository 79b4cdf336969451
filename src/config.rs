/*!
 * Configuration types for Havoc
 */

use crate::error::{HavocError, Result};
use havoc_chaos::MonkeyPolicy;
use havoc_core_resilience::{CircuitBreakerConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Retry policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per upload
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff before the second attempt, in milliseconds; doubles per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Add uniform random jitter to each backoff sleep
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            jitter: self.jitter,
        }
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,

    /// Seconds the circuit stays open before probing
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
        }
    }
}

impl BreakerConfig {
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_secs(self.reset_timeout_secs),
        }
    }
}

/// Chaos monkey parameter ranges, inclusive on both ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonkeyConfig {
    /// Injected latency range in milliseconds
    #[serde(default = "default_latency_ms")]
    pub latency_ms: (u64, u64),

    /// CPU burn worker count range
    #[serde(default = "default_cpu_workers")]
    pub cpu_workers: (usize, usize),

    /// Memory pressure range in megabytes
    #[serde(default = "default_memory_mb")]
    pub memory_mb: (u64, u64),

    /// Write corruption probability range
    #[serde(default = "default_corruption_probability")]
    pub corruption_probability: (f64, f64),
}

impl Default for MonkeyConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
            cpu_workers: default_cpu_workers(),
            memory_mb: default_memory_mb(),
            corruption_probability: default_corruption_probability(),
        }
    }
}

impl MonkeyConfig {
    pub fn policy(&self) -> MonkeyPolicy {
        MonkeyPolicy {
            latency_ms: self.latency_ms,
            cpu_workers: self.cpu_workers,
            memory_mb: self.memory_mb,
            corruption_probability: self.corruption_probability,
        }
    }
}

/// Main configuration for the harness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HavocConfig {
    /// Bucket uploads land in
    #[serde(default = "default_raw_bucket")]
    pub raw_bucket: String,

    /// Bucket processed datasets land in
    #[serde(default = "default_processed_bucket")]
    pub processed_bucket: String,

    /// Queue pipeline events are published to
    #[serde(default = "default_notification_queue")]
    pub notification_queue: String,

    /// Queue exhausted uploads are dead-lettered to
    #[serde(default = "default_dead_letter_queue")]
    pub dead_letter_queue: String,

    /// Records per generated sample dataset
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Retry policy for uploads
    #[serde(default)]
    pub retry: RetryConfig,

    /// Circuit breaker guarding processing
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Chaos monkey parameter ranges
    #[serde(default)]
    pub monkey: MonkeyConfig,
}

impl Default for HavocConfig {
    fn default() -> Self {
        Self {
            raw_bucket: default_raw_bucket(),
            processed_bucket: default_processed_bucket(),
            notification_queue: default_notification_queue(),
            dead_letter_queue: default_dead_letter_queue(),
            sample_size: default_sample_size(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            monkey: MonkeyConfig::default(),
        }
    }
}

impl HavocConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HavocError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: HavocConfig = toml::from_str(&text)
            .map_err(|e| HavocError::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("raw_bucket", &self.raw_bucket),
            ("processed_bucket", &self.processed_bucket),
            ("notification_queue", &self.notification_queue),
            ("dead_letter_queue", &self.dead_letter_queue),
        ] {
            if value.is_empty() {
                return Err(HavocError::Config(format!("{field} must not be empty")));
            }
        }
        if self.raw_bucket == self.processed_bucket {
            return Err(HavocError::Config(
                "raw_bucket and processed_bucket must differ".to_string(),
            ));
        }
        if self.retry.max_retries == 0 {
            return Err(HavocError::Config("retry.max_retries must be >= 1".to_string()));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(HavocError::Config(
                "breaker.failure_threshold must be >= 1".to_string(),
            ));
        }
        self.monkey
            .policy()
            .validate()
            .map_err(|e| HavocError::Config(e.to_string()))?;
        Ok(())
    }
}

fn default_raw_bucket() -> String {
    "raw-data".to_string()
}

fn default_processed_bucket() -> String {
    "processed-data".to_string()
}

fn default_notification_queue() -> String {
    "pipeline-events".to_string()
}

fn default_dead_letter_queue() -> String {
    "upload-dlq".to_string()
}

fn default_sample_size() -> usize {
    100
}

fn default_max_retries() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_failure_threshold() -> usize {
    3
}

fn default_reset_timeout_secs() -> u64 {
    30
}

fn default_latency_ms() -> (u64, u64) {
    (100, 1000)
}

fn default_cpu_workers() -> (usize, usize) {
    (1, 4)
}

fn default_memory_mb() -> (u64, u64) {
    (50, 200)
}

fn default_corruption_probability() -> (f64, f64) {
    (0.1, 0.5)
}

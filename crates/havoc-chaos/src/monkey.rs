//! Chaos monkey
//!
//! Randomized fault orchestration over a bounded run. Each iteration picks
//! an experiment kind uniformly at random, draws its parameters from the
//! policy ranges, lets the fault act for the configured interval, then
//! clears it before the next draw. A failed iteration is logged and the run
//! continues; one bad experiment never ends the campaign.

use crate::error::{ChaosError, ServiceKind};
use crate::experiment::{ChaosReport, ExperimentKind};
use crate::injector::ChaosInjector;
use rand::seq::IteratorRandom;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Parameter ranges the monkey draws from, inclusive on both ends
#[derive(Debug, Clone)]
pub struct MonkeyPolicy {
    /// Injected latency in milliseconds
    pub latency_ms: (u64, u64),
    /// Number of CPU burn workers
    pub cpu_workers: (usize, usize),
    /// Memory pressure allocation in megabytes
    pub memory_mb: (u64, u64),
    /// Write corruption probability
    pub corruption_probability: (f64, f64),
}

impl Default for MonkeyPolicy {
    fn default() -> Self {
        Self {
            latency_ms: (100, 1000),
            cpu_workers: (1, 4),
            memory_mb: (50, 200),
            corruption_probability: (0.1, 0.5),
        }
    }
}

impl MonkeyPolicy {
    /// Check that every range is ordered and probabilities lie in [0, 1]
    pub fn validate(&self) -> Result<(), ChaosError> {
        if self.latency_ms.0 > self.latency_ms.1 {
            return Err(ChaosError::InvalidPolicy(format!(
                "latency range {}..{} is inverted",
                self.latency_ms.0, self.latency_ms.1
            )));
        }
        if self.cpu_workers.0 > self.cpu_workers.1 || self.cpu_workers.0 == 0 {
            return Err(ChaosError::InvalidPolicy(format!(
                "cpu worker range {}..{} is invalid",
                self.cpu_workers.0, self.cpu_workers.1
            )));
        }
        if self.memory_mb.0 > self.memory_mb.1 {
            return Err(ChaosError::InvalidPolicy(format!(
                "memory range {}..{} is inverted",
                self.memory_mb.0, self.memory_mb.1
            )));
        }
        let (lo, hi) = self.corruption_probability;
        if lo > hi || !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) {
            return Err(ChaosError::InvalidPolicy(format!(
                "corruption probability range {lo}..{hi} is invalid"
            )));
        }
        Ok(())
    }
}

/// Runs randomized chaos experiments against an injector
pub struct ChaosMonkey {
    injector: Arc<ChaosInjector>,
    policy: MonkeyPolicy,
}

impl ChaosMonkey {
    /// Create a monkey over `injector`; the policy is validated up front
    pub fn new(injector: Arc<ChaosInjector>, policy: MonkeyPolicy) -> Result<Self, ChaosError> {
        policy.validate()?;
        Ok(Self { injector, policy })
    }

    /// Run experiments until `total_duration` elapses or `cancel` fires.
    ///
    /// Each experiment is given `interval` to act before it is cleared.
    /// Returns the number of experiments executed.
    pub async fn run(
        &self,
        total_duration: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> usize {
        let deadline = Instant::now() + total_duration;
        let mut executed = 0usize;

        info!(
            total_secs = total_duration.as_secs_f64(),
            interval_secs = interval.as_secs_f64(),
            "chaos monkey starting"
        );

        while Instant::now() < deadline && !cancel.is_cancelled() {
            let kind = {
                let mut rng = rand::rng();
                ExperimentKind::ALL
                    .iter()
                    .copied()
                    .choose(&mut rng)
                    .expect("experiment kinds are non-empty")
            };

            if let Err(e) = self.run_one(kind, interval, cancel).await {
                warn!(%kind, error = %e, "experiment failed, continuing");
            }
            executed += 1;
        }

        self.injector.restore_all().await;
        info!(executed, "chaos monkey finished");
        executed
    }

    /// The aggregate report over everything the injector has logged
    pub fn report(&self) -> ChaosReport {
        self.injector.log().report()
    }

    async fn run_one(
        &self,
        kind: ExperimentKind,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ChaosError> {
        match kind {
            ExperimentKind::NetworkLatency => {
                let delay = {
                    let mut rng = rand::rng();
                    let (lo, hi) = self.policy.latency_ms;
                    Duration::from_millis(rng.random_range(lo..=hi))
                };
                self.injector.inject_latency(delay, interval).await?;
                self.dwell(interval, cancel).await;
                self.injector.restore(ServiceKind::Storage).await;
            }
            ExperimentKind::ServiceFailure => {
                let service = {
                    let mut rng = rand::rng();
                    if rng.random_bool(0.5) {
                        ServiceKind::Storage
                    } else {
                        ServiceKind::Messaging
                    }
                };
                self.injector.inject_outage(service, interval).await?;
                self.dwell(interval, cancel).await;
                self.injector.restore(service).await;
            }
            ExperimentKind::DataCorruption => {
                let probability = {
                    let mut rng = rand::rng();
                    let (lo, hi) = self.policy.corruption_probability;
                    rng.random_range(lo..=hi)
                };
                self.injector.inject_corruption(probability).await?;
                self.dwell(interval, cancel).await;
                self.injector.restore(ServiceKind::Storage).await;
            }
            ExperimentKind::HighCpuLoad => {
                let workers = {
                    let mut rng = rand::rng();
                    let (lo, hi) = self.policy.cpu_workers;
                    rng.random_range(lo..=hi)
                };
                self.injector.cpu_load(interval, workers).await;
            }
            ExperimentKind::MemoryPressure => {
                let megabytes = {
                    let mut rng = rand::rng();
                    let (lo, hi) = self.policy.memory_mb;
                    rng.random_range(lo..=hi)
                };
                self.injector.memory_pressure(interval, megabytes).await;
            }
        }
        Ok(())
    }

    async fn dwell(&self, interval: Duration, cancel: &CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{QueueProxy, StoreProxy};
    use havoc_core_interface::{MemoryQueue, MemoryStore};

    fn injector() -> Arc<ChaosInjector> {
        let store = Arc::new(StoreProxy::new(Arc::new(MemoryStore::new())));
        let queue = Arc::new(QueueProxy::new(Arc::new(MemoryQueue::new())));
        Arc::new(ChaosInjector::new(store, queue))
    }

    #[test]
    fn test_default_policy_is_valid() {
        assert!(MonkeyPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        let mut policy = MonkeyPolicy::default();
        policy.latency_ms = (500, 100);
        assert!(matches!(
            policy.validate(),
            Err(ChaosError::InvalidPolicy(_))
        ));

        let mut policy = MonkeyPolicy::default();
        policy.corruption_probability = (0.2, 1.7);
        assert!(policy.validate().is_err());

        let mut policy = MonkeyPolicy::default();
        policy.cpu_workers = (0, 2);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_new_rejects_invalid_policy() {
        let mut policy = MonkeyPolicy::default();
        policy.memory_mb = (200, 50);
        assert!(ChaosMonkey::new(injector(), policy).is_err());
    }

    #[tokio::test]
    async fn test_bounded_run_executes_and_restores() {
        let injector = injector();
        let policy = MonkeyPolicy {
            latency_ms: (1, 5),
            cpu_workers: (1, 1),
            memory_mb: (1, 2),
            corruption_probability: (0.1, 0.5),
        };
        let monkey = ChaosMonkey::new(injector.clone(), policy).unwrap();

        let cancel = CancellationToken::new();
        let executed = monkey
            .run(
                Duration::from_millis(150),
                Duration::from_millis(20),
                &cancel,
            )
            .await;

        assert!(executed >= 1);
        assert!(injector.active_fault(ServiceKind::Storage).await.is_none());
        assert!(injector.active_fault(ServiceKind::Messaging).await.is_none());
        assert_eq!(monkey.report().total_experiments, injector.log().len());
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_run() {
        let monkey = ChaosMonkey::new(injector(), MonkeyPolicy {
            latency_ms: (1, 5),
            cpu_workers: (1, 1),
            memory_mb: (1, 2),
            corruption_probability: (0.1, 0.5),
        })
        .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let executed = monkey
            .run(Duration::from_secs(30), Duration::from_millis(10), &cancel)
            .await;

        assert_eq!(executed, 0);
    }
}

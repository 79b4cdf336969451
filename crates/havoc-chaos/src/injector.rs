//! Fault injector
//!
//! Owns the swap proxies and a registry of which fault is live on each
//! service group. At most one fault per service: a second injection against
//! an already-faulted service is rejected outright rather than stacked or
//! superseded. Registry bookkeeping and the proxy swap happen inside one
//! registry critical section, so a concurrent restore can never leave a
//! decorator installed with no registry entry. Every activation attempt,
//! accepted or rejected, lands in the experiment log.

use crate::corruption::CorruptingStore;
use crate::error::{ChaosError, ServiceKind};
use crate::experiment::{ExperimentKind, ExperimentLog};
use crate::latency::LatencyStore;
use crate::outage::{FailingQueue, FailingStore};
use crate::pressure::{self, PressureReport};
use crate::proxy::{QueueProxy, StoreProxy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
struct ActiveFault {
    kind: ExperimentKind,
    generation: u64,
}

#[derive(Debug, Default)]
struct Registry {
    faults: HashMap<ServiceKind, ActiveFault>,
    next_generation: u64,
}

impl Registry {
    fn activate(
        &mut self,
        service: ServiceKind,
        kind: ExperimentKind,
    ) -> Result<u64, ChaosError> {
        if self.faults.contains_key(&service) {
            return Err(ChaosError::FaultAlreadyActive { service });
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.faults.insert(service, ActiveFault { kind, generation });
        Ok(generation)
    }
}

/// Activates and clears faults behind the proxies
pub struct ChaosInjector {
    store: Arc<StoreProxy>,
    queue: Arc<QueueProxy>,
    registry: Arc<Mutex<Registry>>,
    log: ExperimentLog,
}

impl ChaosInjector {
    pub fn new(store: Arc<StoreProxy>, queue: Arc<QueueProxy>) -> Self {
        Self {
            store,
            queue,
            registry: Arc::new(Mutex::new(Registry::default())),
            log: ExperimentLog::new(),
        }
    }

    /// The experiment log all activations are recorded in
    pub fn log(&self) -> &ExperimentLog {
        &self.log
    }

    /// The fault currently live on `service`, if any
    pub async fn active_fault(&self, service: ServiceKind) -> Option<ExperimentKind> {
        self.registry.lock().await.faults.get(&service).map(|f| f.kind)
    }

    /// Delay storage writes by `delay` for the next `window`.
    ///
    /// The decorator is uninstalled automatically when the window elapses.
    pub async fn inject_latency(
        &self,
        delay: Duration,
        window: Duration,
    ) -> Result<(), ChaosError> {
        let description = format!(
            "storage latency {}ms for {:.1}s",
            delay.as_millis(),
            window.as_secs_f64()
        );
        let generation = {
            let mut registry = self.registry.lock().await;
            let generation = self.register(
                &mut registry,
                ServiceKind::Storage,
                ExperimentKind::NetworkLatency,
                &description,
                window,
            )?;
            let decorator = LatencyStore::new(self.store.original(), delay, window);
            self.store.swap(Arc::new(decorator)).await;
            generation
        };
        self.schedule_restore(ServiceKind::Storage, generation, window);
        info!(delay_ms = delay.as_millis() as u64, "latency fault active");
        Ok(())
    }

    /// Fail every operation of `service` for the next `window`.
    ///
    /// The original backend is restored automatically when the window
    /// elapses; storage and messaging outages are independent.
    pub async fn inject_outage(
        &self,
        service: ServiceKind,
        window: Duration,
    ) -> Result<(), ChaosError> {
        let description = format!("{service} outage for {:.1}s", window.as_secs_f64());
        let generation = {
            let mut registry = self.registry.lock().await;
            let generation = self.register(
                &mut registry,
                service,
                ExperimentKind::ServiceFailure,
                &description,
                window,
            )?;
            match service {
                ServiceKind::Storage => self.store.swap(Arc::new(FailingStore::new())).await,
                ServiceKind::Messaging => self.queue.swap(Arc::new(FailingQueue::new())).await,
            }
            generation
        };
        self.schedule_restore(service, generation, window);
        info!(%service, "outage fault active");
        Ok(())
    }

    /// Corrupt storage writes with the given probability until cleared
    pub async fn inject_corruption(&self, probability: f64) -> Result<(), ChaosError> {
        let description = format!("write corruption at probability {probability:.2}");
        if !(0.0..=1.0).contains(&probability) {
            self.log.record(
                ExperimentKind::DataCorruption,
                &description,
                false,
                Duration::ZERO,
            );
            return Err(ChaosError::InvalidProbability(probability));
        }
        {
            let mut registry = self.registry.lock().await;
            self.register(
                &mut registry,
                ServiceKind::Storage,
                ExperimentKind::DataCorruption,
                &description,
                Duration::ZERO,
            )?;
            let decorator = CorruptingStore::new(self.store.original(), probability);
            self.store.swap(Arc::new(decorator)).await;
        }
        info!(probability, "corruption fault active");
        Ok(())
    }

    /// Burn CPU on `workers` threads for `duration`.
    ///
    /// Self-terminating; does not occupy a service fault slot.
    pub async fn cpu_load(&self, duration: Duration, workers: usize) -> PressureReport {
        let report = pressure::cpu_load(duration, workers).await;
        self.log.record(
            ExperimentKind::HighCpuLoad,
            format!(
                "cpu load with {workers} workers, peak {:.1}%",
                report.peak
            ),
            true,
            report.elapsed,
        );
        report
    }

    /// Hold `megabytes` of memory for `duration`.
    ///
    /// Self-terminating; does not occupy a service fault slot.
    pub async fn memory_pressure(&self, duration: Duration, megabytes: u64) -> PressureReport {
        let report = pressure::memory_pressure(duration, megabytes).await;
        self.log.record(
            ExperimentKind::MemoryPressure,
            format!(
                "memory pressure of {megabytes}MB, peak {:.1}% used",
                report.peak
            ),
            true,
            report.elapsed,
        );
        report
    }

    /// Clear an active latency fault. A no-op when the storage fault is
    /// absent or of a different kind.
    pub async fn clear_latency(&self) {
        self.clear_kind(ExperimentKind::NetworkLatency).await;
    }

    /// Clear an active corruption fault. A no-op when the storage fault is
    /// absent or of a different kind.
    pub async fn clear_corruption(&self) {
        self.clear_kind(ExperimentKind::DataCorruption).await;
    }

    async fn clear_kind(&self, kind: ExperimentKind) {
        let mut registry = self.registry.lock().await;
        let matches = registry
            .faults
            .get(&ServiceKind::Storage)
            .is_some_and(|fault| fault.kind == kind);
        if matches {
            registry.faults.remove(&ServiceKind::Storage);
            info!(%kind, "clearing storage fault");
            self.store.restore().await;
        }
    }

    /// Clear any fault on `service` and reinstate the original backend.
    /// A no-op when nothing is active.
    pub async fn restore(&self, service: ServiceKind) {
        // Unregister and restore under one lock so an in-flight injection
        // cannot interleave between the two.
        let mut registry = self.registry.lock().await;
        if registry.faults.remove(&service).is_some() {
            info!(%service, "restoring service");
        }
        match service {
            ServiceKind::Storage => self.store.restore().await,
            ServiceKind::Messaging => self.queue.restore().await,
        }
    }

    /// Clear every active fault
    pub async fn restore_all(&self) {
        self.restore(ServiceKind::Storage).await;
        self.restore(ServiceKind::Messaging).await;
    }

    // Register under the caller's registry lock; the caller swaps the proxy
    // in the same critical section.
    fn register(
        &self,
        registry: &mut Registry,
        service: ServiceKind,
        kind: ExperimentKind,
        description: &str,
        window: Duration,
    ) -> Result<u64, ChaosError> {
        match registry.activate(service, kind) {
            Ok(generation) => {
                self.log.record(kind, description, true, window);
                Ok(generation)
            }
            Err(e) => {
                warn!(%service, %kind, "rejecting overlapping fault");
                self.log.record(kind, description, false, window);
                Err(e)
            }
        }
    }

    // Uninstall a windowed fault when its window elapses, unless it was
    // already cleared and possibly replaced by a newer one.
    fn schedule_restore(&self, service: ServiceKind, generation: u64, window: Duration) {
        let store = self.store.clone();
        let queue = self.queue.clone();
        let registry = self.registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut registry = registry.lock().await;
            let current = registry.faults.get(&service).map(|f| f.generation);
            if current == Some(generation) {
                registry.faults.remove(&service);
                info!(%service, "fault window elapsed, restoring");
                match service {
                    ServiceKind::Storage => store.restore().await,
                    ServiceKind::Messaging => queue.restore().await,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use havoc_core_interface::{
        CloudError, Dataset, MemoryQueue, MemoryStore, MessageQueue, ObjectStore, Record,
    };
    use serde_json::json;

    fn harness() -> (ChaosInjector, Arc<StoreProxy>, Arc<QueueProxy>) {
        let store = Arc::new(StoreProxy::new(Arc::new(MemoryStore::new())));
        let queue = Arc::new(QueueProxy::new(Arc::new(MemoryQueue::new())));
        (ChaosInjector::new(store.clone(), queue.clone()), store, queue)
    }

    fn sample_dataset() -> Dataset {
        let mut r = Record::new();
        r.insert("transaction_id".into(), json!("TXN-1"));
        Dataset::from_records(vec![r])
    }

    #[tokio::test]
    async fn test_overlapping_storage_faults_rejected() {
        let (injector, _, _) = harness();

        injector
            .inject_latency(Duration::from_millis(10), Duration::from_secs(30))
            .await
            .unwrap();
        let err = injector.inject_corruption(0.5).await.unwrap_err();
        assert!(matches!(
            err,
            ChaosError::FaultAlreadyActive {
                service: ServiceKind::Storage
            }
        ));

        // Both the accepted and the rejected attempt were logged
        assert_eq!(injector.log().len(), 2);
        let entries = injector.log().snapshot();
        assert!(entries[0].succeeded);
        assert!(!entries[1].succeeded);
    }

    #[tokio::test]
    async fn test_outages_are_independent_per_service() {
        let (injector, store, queue) = harness();
        store.create_bucket("raw-data").await.unwrap();

        injector
            .inject_outage(ServiceKind::Storage, Duration::from_secs(30))
            .await
            .unwrap();

        assert!(store.put("raw-data", "k", &sample_dataset()).await.is_err());
        // Messaging still works and can host its own fault
        queue.create_queue("events").await.unwrap();
        injector
            .inject_outage(ServiceKind::Messaging, Duration::from_secs(30))
            .await
            .unwrap();

        injector.restore(ServiceKind::Storage).await;
        store.put("raw-data", "k", &sample_dataset()).await.unwrap();
        assert_eq!(
            injector.active_fault(ServiceKind::Messaging).await,
            Some(ExperimentKind::ServiceFailure)
        );
    }

    #[tokio::test]
    async fn test_outage_window_auto_restores() {
        let (injector, store, _) = harness();
        store.create_bucket("raw-data").await.unwrap();

        injector
            .inject_outage(ServiceKind::Storage, Duration::from_millis(30))
            .await
            .unwrap();
        assert!(store.put("raw-data", "k", &sample_dataset()).await.is_err());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(injector.active_fault(ServiceKind::Storage).await.is_none());
        store.put("raw-data", "k", &sample_dataset()).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_probability_rejected_and_logged() {
        let (injector, _, _) = harness();

        let err = injector.inject_corruption(1.5).await.unwrap_err();
        assert!(matches!(err, ChaosError::InvalidProbability(p) if p == 1.5));
        assert!(injector.active_fault(ServiceKind::Storage).await.is_none());
        assert_eq!(injector.log().len(), 1);
        assert!(!injector.log().snapshot()[0].succeeded);
    }

    #[tokio::test]
    async fn test_restore_is_idempotent() {
        let (injector, store, _) = harness();
        store.create_bucket("raw-data").await.unwrap();

        injector.restore(ServiceKind::Storage).await;
        injector.restore_all().await;
        store.put("raw-data", "k", &sample_dataset()).await.unwrap();

        // After an inject/restore cycle a new fault is accepted again
        injector.inject_corruption(0.2).await.unwrap();
        injector.restore(ServiceKind::Storage).await;
        injector
            .inject_latency(Duration::from_millis(5), Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_inject_and_restore_stay_consistent() {
        let (injector, store, _) = harness();
        let injector = Arc::new(injector);
        store.create_bucket("raw-data").await.unwrap();

        // Race an injection against a restore; whichever side wins, the
        // registry and the proxy must agree afterwards.
        for _ in 0..200 {
            let inject = {
                let injector = injector.clone();
                tokio::spawn(async move {
                    let _ = injector
                        .inject_outage(ServiceKind::Storage, Duration::from_secs(30))
                        .await;
                })
            };
            let restore = {
                let injector = injector.clone();
                tokio::spawn(async move {
                    injector.restore(ServiceKind::Storage).await;
                })
            };
            inject.await.unwrap();
            restore.await.unwrap();

            match injector.active_fault(ServiceKind::Storage).await {
                Some(_) => assert!(store.is_faulted().await),
                None => assert!(
                    !store.is_faulted().await,
                    "no registered fault but a decorator is still installed"
                ),
            }
            injector.restore(ServiceKind::Storage).await;
        }
    }

    #[tokio::test]
    async fn test_clear_is_guarded_by_fault_kind() {
        let (injector, _, _) = harness();

        injector.inject_corruption(0.5).await.unwrap();
        // Wrong kind: the corruption fault stays active
        injector.clear_latency().await;
        assert_eq!(
            injector.active_fault(ServiceKind::Storage).await,
            Some(ExperimentKind::DataCorruption)
        );
        injector.clear_corruption().await;
        assert!(injector.active_fault(ServiceKind::Storage).await.is_none());
        // Idempotent once cleared
        injector.clear_corruption().await;
    }

    #[tokio::test]
    async fn test_outage_error_is_tagged_with_service() {
        let (injector, _, queue) = harness();
        let handle = queue.create_queue("events").await.unwrap();

        injector
            .inject_outage(ServiceKind::Messaging, Duration::from_secs(30))
            .await
            .unwrap();
        let err = queue.receive(&handle).await.unwrap_err();
        assert!(
            matches!(err, CloudError::Unavailable { ref service } if service == "messaging")
        );
    }

    #[tokio::test]
    async fn test_pressure_experiments_are_logged() {
        let (injector, _, _) = harness();

        let report = injector.cpu_load(Duration::from_millis(60), 1).await;
        assert!(report.elapsed >= Duration::from_millis(60));
        injector
            .memory_pressure(Duration::from_millis(60), 4)
            .await;

        assert_eq!(injector.log().len(), 2);
        assert!(injector.log().snapshot().iter().all(|e| e.succeeded));
    }
}

//! Network latency fault
//!
//! Delays writes by a fixed amount inside a bounded time window. Once the
//! window elapses the delay stops on its own even if nobody clears the
//! fault, so an abandoned experiment cannot slow the system forever.

use async_trait::async_trait;
use havoc_core_interface::{Dataset, ObjectStore, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Decorator that sleeps before every `put` while the window is open.
///
/// Reads and bucket management are unaffected; the slow path in the systems
/// this models is the upload.
pub struct LatencyStore {
    inner: Arc<dyn ObjectStore>,
    delay: Duration,
    until: Instant,
}

impl LatencyStore {
    /// Delay writes to `inner` by `delay` for the next `window`
    pub fn new(inner: Arc<dyn ObjectStore>, delay: Duration, window: Duration) -> Self {
        Self {
            inner,
            delay,
            until: Instant::now() + window,
        }
    }

    /// Whether the latency window is still open
    pub fn is_active(&self) -> bool {
        Instant::now() < self.until
    }
}

#[async_trait]
impl ObjectStore for LatencyStore {
    async fn create_bucket(&self, name: &str) -> Result<bool> {
        self.inner.create_bucket(name).await
    }

    async fn put(&self, bucket: &str, key: &str, data: &Dataset) -> Result<()> {
        if self.is_active() {
            debug!(bucket, key, delay_ms = self.delay.as_millis() as u64, "injecting latency");
            tokio::time::sleep(self.delay).await;
        }
        self.inner.put(bucket, key, data).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Dataset>> {
        self.inner.get(bucket, key).await
    }

    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        self.inner.list(bucket).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use havoc_core_interface::MemoryStore;
    use std::time::Instant as StdInstant;

    fn sample_dataset() -> Dataset {
        let mut record = serde_json::Map::new();
        record.insert("transaction_id".into(), serde_json::json!("TXN-1"));
        Dataset::from_records(vec![record])
    }

    #[tokio::test]
    async fn test_put_is_delayed_inside_window() {
        let inner = Arc::new(MemoryStore::new());
        inner.create_bucket("raw-data").await.unwrap();
        let store = LatencyStore::new(
            inner,
            Duration::from_millis(60),
            Duration::from_secs(10),
        );

        let start = StdInstant::now();
        store.put("raw-data", "k", &sample_dataset()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_reads_are_not_delayed() {
        let inner = Arc::new(MemoryStore::new());
        inner.create_bucket("raw-data").await.unwrap();
        inner.put("raw-data", "k", &sample_dataset()).await.unwrap();
        let store = LatencyStore::new(inner, Duration::from_secs(5), Duration::from_secs(10));

        let start = StdInstant::now();
        let data = store.get("raw-data", "k").await.unwrap();
        assert!(data.is_some());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_delay_expires_with_window() {
        let inner = Arc::new(MemoryStore::new());
        inner.create_bucket("raw-data").await.unwrap();
        let store = LatencyStore::new(
            inner,
            Duration::from_secs(5),
            Duration::from_millis(20),
        );

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.is_active());

        let start = StdInstant::now();
        store.put("raw-data", "k", &sample_dataset()).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}

//! Swap proxies for fault injection
//!
//! A proxy sits between the caller and a real backend and forwards every
//! call to whichever implementation it currently holds. The injector swaps
//! the held implementation to activate a fault and restores the original to
//! clear it; callers keep their handle across swaps and never observe the
//! switch except through behavior.

use async_trait::async_trait;
use havoc_core_interface::{
    Dataset, MessageQueue, ObjectStore, QueueEvent, QueueHandle, ReceivedMessage, Result,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Swappable [`ObjectStore`] front
pub struct StoreProxy {
    original: Arc<dyn ObjectStore>,
    inner: RwLock<Arc<dyn ObjectStore>>,
}

impl StoreProxy {
    /// Wrap `original`; the proxy starts in pass-through mode
    pub fn new(original: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner: RwLock::new(original.clone()),
            original,
        }
    }

    /// The unfaulted backend, for decorators to delegate to
    pub fn original(&self) -> Arc<dyn ObjectStore> {
        self.original.clone()
    }

    /// Route all subsequent calls through `replacement`
    pub async fn swap(&self, replacement: Arc<dyn ObjectStore>) {
        debug!("swapping storage implementation");
        *self.inner.write().await = replacement;
    }

    /// Route all subsequent calls back to the original. Idempotent.
    pub async fn restore(&self) {
        debug!("restoring storage implementation");
        *self.inner.write().await = self.original.clone();
    }

    /// Whether a replacement is currently installed
    pub async fn is_faulted(&self) -> bool {
        !Arc::ptr_eq(&*self.inner.read().await, &self.original)
    }

    async fn current(&self) -> Arc<dyn ObjectStore> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl ObjectStore for StoreProxy {
    async fn create_bucket(&self, name: &str) -> Result<bool> {
        self.current().await.create_bucket(name).await
    }

    async fn put(&self, bucket: &str, key: &str, data: &Dataset) -> Result<()> {
        self.current().await.put(bucket, key, data).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Dataset>> {
        self.current().await.get(bucket, key).await
    }

    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        self.current().await.list(bucket).await
    }
}

/// Swappable [`MessageQueue`] front
pub struct QueueProxy {
    original: Arc<dyn MessageQueue>,
    inner: RwLock<Arc<dyn MessageQueue>>,
}

impl QueueProxy {
    /// Wrap `original`; the proxy starts in pass-through mode
    pub fn new(original: Arc<dyn MessageQueue>) -> Self {
        Self {
            inner: RwLock::new(original.clone()),
            original,
        }
    }

    /// The unfaulted backend, for decorators to delegate to
    pub fn original(&self) -> Arc<dyn MessageQueue> {
        self.original.clone()
    }

    /// Route all subsequent calls through `replacement`
    pub async fn swap(&self, replacement: Arc<dyn MessageQueue>) {
        debug!("swapping messaging implementation");
        *self.inner.write().await = replacement;
    }

    /// Route all subsequent calls back to the original. Idempotent.
    pub async fn restore(&self) {
        debug!("restoring messaging implementation");
        *self.inner.write().await = self.original.clone();
    }

    /// Whether a replacement is currently installed
    pub async fn is_faulted(&self) -> bool {
        !Arc::ptr_eq(&*self.inner.read().await, &self.original)
    }

    async fn current(&self) -> Arc<dyn MessageQueue> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl MessageQueue for QueueProxy {
    async fn create_queue(&self, name: &str) -> Result<QueueHandle> {
        self.current().await.create_queue(name).await
    }

    async fn send(&self, queue: &QueueHandle, event: &QueueEvent) -> Result<String> {
        self.current().await.send(queue, event).await
    }

    async fn receive(&self, queue: &QueueHandle) -> Result<Vec<ReceivedMessage>> {
        self.current().await.receive(queue).await
    }

    async fn delete(&self, queue: &QueueHandle, receipt_handle: &str) -> Result<bool> {
        self.current().await.delete(queue, receipt_handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outage::{FailingQueue, FailingStore};
    use havoc_core_interface::{CloudError, MemoryQueue, MemoryStore};

    fn sample_dataset() -> Dataset {
        let mut record = serde_json::Map::new();
        record.insert("transaction_id".into(), serde_json::json!("TXN-1"));
        record.insert("amount".into(), serde_json::json!(42.5));
        Dataset::from_records(vec![record])
    }

    #[tokio::test]
    async fn test_pass_through_by_default() {
        let store = Arc::new(MemoryStore::new());
        let proxy = StoreProxy::new(store);

        proxy.create_bucket("raw-data").await.unwrap();
        proxy.put("raw-data", "batch-1", &sample_dataset()).await.unwrap();

        assert!(!proxy.is_faulted().await);
        let back = proxy.get("raw-data", "batch-1").await.unwrap().unwrap();
        assert_eq!(back.len(), 1);
    }

    #[tokio::test]
    async fn test_swap_and_restore() {
        let store = Arc::new(MemoryStore::new());
        let proxy = StoreProxy::new(store);
        proxy.create_bucket("raw-data").await.unwrap();

        proxy.swap(Arc::new(FailingStore::new())).await;
        assert!(proxy.is_faulted().await);
        let err = proxy.put("raw-data", "k", &sample_dataset()).await.unwrap_err();
        assert!(matches!(err, CloudError::Unavailable { .. }));

        proxy.restore().await;
        assert!(!proxy.is_faulted().await);
        proxy.put("raw-data", "k", &sample_dataset()).await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_is_idempotent() {
        let proxy = StoreProxy::new(Arc::new(MemoryStore::new()));
        proxy.restore().await;
        proxy.restore().await;
        assert!(!proxy.is_faulted().await);
    }

    #[tokio::test]
    async fn test_queue_proxy_swap() {
        let queue = Arc::new(MemoryQueue::new());
        let proxy = QueueProxy::new(queue);
        let handle = proxy.create_queue("events").await.unwrap();

        proxy.swap(Arc::new(FailingQueue::new())).await;
        let err = proxy.receive(&handle).await.unwrap_err();
        assert!(matches!(err, CloudError::Unavailable { .. }));

        proxy.restore().await;
        assert!(proxy.receive(&handle).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_state_written_while_faulted_is_preserved() {
        // The original keeps its state across a fault window
        let store = Arc::new(MemoryStore::new());
        let proxy = StoreProxy::new(store);
        proxy.create_bucket("raw-data").await.unwrap();
        proxy.put("raw-data", "before", &sample_dataset()).await.unwrap();

        proxy.swap(Arc::new(FailingStore::new())).await;
        proxy.restore().await;

        let keys = proxy.list("raw-data").await.unwrap();
        assert_eq!(keys, vec!["before".to_string()]);
    }
}

//! Service outage fault
//!
//! Replacement backends where every operation fails with a tagged
//! unavailability error. Swapping one in behind a proxy simulates a full
//! outage of that service group while the other group keeps working.

use async_trait::async_trait;
use havoc_core_interface::{
    CloudError, Dataset, MessageQueue, ObjectStore, QueueEvent, QueueHandle, ReceivedMessage,
    Result,
};
use tracing::warn;

/// Object store where every call fails
#[derive(Debug, Default)]
pub struct FailingStore;

impl FailingStore {
    pub fn new() -> Self {
        Self
    }

    fn unavailable<T>(&self, op: &str) -> Result<T> {
        warn!(op, "storage outage active, rejecting call");
        Err(CloudError::unavailable("storage"))
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn create_bucket(&self, _name: &str) -> Result<bool> {
        self.unavailable("create_bucket")
    }

    async fn put(&self, _bucket: &str, _key: &str, _data: &Dataset) -> Result<()> {
        self.unavailable("put")
    }

    async fn get(&self, _bucket: &str, _key: &str) -> Result<Option<Dataset>> {
        self.unavailable("get")
    }

    async fn list(&self, _bucket: &str) -> Result<Vec<String>> {
        self.unavailable("list")
    }
}

/// Message queue where every call fails
#[derive(Debug, Default)]
pub struct FailingQueue;

impl FailingQueue {
    pub fn new() -> Self {
        Self
    }

    fn unavailable<T>(&self, op: &str) -> Result<T> {
        warn!(op, "messaging outage active, rejecting call");
        Err(CloudError::unavailable("messaging"))
    }
}

#[async_trait]
impl MessageQueue for FailingQueue {
    async fn create_queue(&self, _name: &str) -> Result<QueueHandle> {
        self.unavailable("create_queue")
    }

    async fn send(&self, _queue: &QueueHandle, _event: &QueueEvent) -> Result<String> {
        self.unavailable("send")
    }

    async fn receive(&self, _queue: &QueueHandle) -> Result<Vec<ReceivedMessage>> {
        self.unavailable("receive")
    }

    async fn delete(&self, _queue: &QueueHandle, _receipt_handle: &str) -> Result<bool> {
        self.unavailable("delete")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_rejects_every_operation() {
        let store = FailingStore::new();

        let err = store.create_bucket("raw-data").await.unwrap_err();
        assert!(matches!(err, CloudError::Unavailable { ref service } if service == "storage"));
        assert!(store.get("raw-data", "k").await.is_err());
        assert!(store.list("raw-data").await.is_err());
        assert!(store.put("raw-data", "k", &Dataset::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_queue_rejects_every_operation() {
        let queue = FailingQueue::new();
        let handle = QueueHandle::new("events");

        let err = queue.receive(&handle).await.unwrap_err();
        assert!(matches!(err, CloudError::Unavailable { ref service } if service == "messaging"));
        assert!(queue.create_queue("events").await.is_err());
        assert!(queue.delete(&handle, "rh-1").await.is_err());
    }
}

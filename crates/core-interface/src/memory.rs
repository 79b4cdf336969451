//! Deterministic in-memory backends
//!
//! [`MemoryStore`] and [`MemoryQueue`] implement the collaborator traits with
//! plain maps behind a `tokio::sync::RwLock`. They are the only backends this
//! repository ships: tests, the chaos harness, and the CLI all run against
//! them, standing in for real cloud services.

use crate::{
    CloudError, Dataset, MessageQueue, ObjectStore, QueueEvent, QueueHandle, ReceivedMessage,
    Result,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::RwLock;

/// How many messages a single `receive` call may return
const RECEIVE_BATCH: usize = 10;

/// In-memory [`ObjectStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, Dataset>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn create_bucket(&self, name: &str) -> Result<bool> {
        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(name) {
            return Ok(false);
        }
        buckets.insert(name.to_string(), BTreeMap::new());
        Ok(true)
    }

    async fn put(&self, bucket: &str, key: &str, data: &Dataset) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| CloudError::BucketMissing(bucket.to_string()))?;
        objects.insert(key.to_string(), data.clone());
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Dataset>> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| CloudError::BucketMissing(bucket.to_string()))?;
        Ok(objects.get(key).cloned())
    }

    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| CloudError::BucketMissing(bucket.to_string()))?;
        Ok(objects.keys().cloned().collect())
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<(u64, QueueEvent)>,
    in_flight: HashMap<String, QueueEvent>,
    next_id: u64,
}

/// In-memory [`MessageQueue`] with receipt-handle acknowledgement
#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: RwLock<HashMap<String, QueueState>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting (not in-flight) on a queue
    pub async fn pending_len(&self, queue: &QueueHandle) -> Result<usize> {
        let queues = self.queues.read().await;
        let state = queues
            .get(queue.id())
            .ok_or_else(|| CloudError::QueueMissing(queue.id().to_string()))?;
        Ok(state.pending.len())
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn create_queue(&self, name: &str) -> Result<QueueHandle> {
        let mut queues = self.queues.write().await;
        queues.entry(name.to_string()).or_default();
        Ok(QueueHandle::new(name))
    }

    async fn send(&self, queue: &QueueHandle, event: &QueueEvent) -> Result<String> {
        let mut queues = self.queues.write().await;
        let state = queues
            .get_mut(queue.id())
            .ok_or_else(|| CloudError::QueueMissing(queue.id().to_string()))?;
        let id = state.next_id;
        state.next_id += 1;
        state.pending.push_back((id, event.clone()));
        Ok(format!("msg-{id}"))
    }

    async fn receive(&self, queue: &QueueHandle) -> Result<Vec<ReceivedMessage>> {
        let mut queues = self.queues.write().await;
        let state = queues
            .get_mut(queue.id())
            .ok_or_else(|| CloudError::QueueMissing(queue.id().to_string()))?;

        let mut batch = Vec::new();
        while batch.len() < RECEIVE_BATCH {
            let Some((id, event)) = state.pending.pop_front() else {
                break;
            };
            let receipt_handle = format!("rh-{id}");
            state.in_flight.insert(receipt_handle.clone(), event.clone());
            batch.push(ReceivedMessage {
                body: event,
                receipt_handle,
            });
        }
        Ok(batch)
    }

    async fn delete(&self, queue: &QueueHandle, receipt_handle: &str) -> Result<bool> {
        let mut queues = self.queues.write().await;
        let state = queues
            .get_mut(queue.id())
            .ok_or_else(|| CloudError::QueueMissing(queue.id().to_string()))?;
        Ok(state.in_flight.remove(receipt_handle).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample_dataset() -> Dataset {
        let mut record = crate::Record::new();
        record.insert("id".into(), json!(1));
        Dataset::from_records(vec![record])
    }

    fn sample_event() -> QueueEvent {
        QueueEvent::NewFile {
            bucket: "b".into(),
            key: "k".into(),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_bucket_twice() {
        let store = MemoryStore::new();
        assert!(store.create_bucket("raw").await.unwrap());
        assert!(!store.create_bucket("raw").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_get_list() {
        let store = MemoryStore::new();
        store.create_bucket("raw").await.unwrap();

        let data = sample_dataset();
        store.put("raw", "raw/a", &data).await.unwrap();
        store.put("raw", "raw/b", &data).await.unwrap();

        assert_eq!(store.get("raw", "raw/a").await.unwrap(), Some(data));
        assert_eq!(store.get("raw", "raw/missing").await.unwrap(), None);
        assert_eq!(
            store.list("raw").await.unwrap(),
            vec!["raw/a".to_string(), "raw/b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_bucket_errors() {
        let store = MemoryStore::new();
        let err = store.get("nope", "k").await.unwrap_err();
        assert_eq!(err, CloudError::BucketMissing("nope".to_string()));
    }

    #[tokio::test]
    async fn test_queue_receive_moves_in_flight() {
        let queue = MemoryQueue::new();
        let handle = queue.create_queue("events").await.unwrap();

        queue.send(&handle, &sample_event()).await.unwrap();
        queue.send(&handle, &sample_event()).await.unwrap();

        let batch = queue.receive(&handle).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(queue.pending_len(&handle).await.unwrap(), 0);

        // Unacknowledged messages are in-flight, not redelivered here
        assert!(queue.receive(&handle).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queue_delete_acknowledges() {
        let queue = MemoryQueue::new();
        let handle = queue.create_queue("events").await.unwrap();
        queue.send(&handle, &sample_event()).await.unwrap();

        let batch = queue.receive(&handle).await.unwrap();
        let receipt = &batch[0].receipt_handle;

        assert!(queue.delete(&handle, receipt).await.unwrap());
        // Double-ack is not an error, just a no-op
        assert!(!queue.delete(&handle, receipt).await.unwrap());
    }

    #[tokio::test]
    async fn test_queue_missing_errors() {
        let queue = MemoryQueue::new();
        let handle = QueueHandle::new("ghost");
        let err = queue.send(&handle, &sample_event()).await.unwrap_err();
        assert_eq!(err, CloudError::QueueMissing("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_receive_batch_cap() {
        let queue = MemoryQueue::new();
        let handle = queue.create_queue("events").await.unwrap();
        for _ in 0..15 {
            queue.send(&handle, &sample_event()).await.unwrap();
        }

        let batch = queue.receive(&handle).await.unwrap();
        assert_eq!(batch.len(), RECEIVE_BATCH);
        assert_eq!(queue.pending_len(&handle).await.unwrap(), 5);
    }
}

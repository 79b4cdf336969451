/*!
 * Background monitors
 *
 * Polling watchers over the cloud collaborators: the bucket monitor diffs
 * object listings and announces new keys, the queue monitor consumes and
 * acknowledges pipeline events. Both run as tokio tasks with an explicit
 * watch-channel shutdown signal and lock-free metric counters; a poll error
 * is counted and the loop continues.
 */

use chrono::Utc;
use havoc_core_interface::{MessageQueue, ObjectStore, QueueEvent, QueueHandle};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Counters a running monitor updates, readable from any task
#[derive(Debug, Default)]
pub struct MonitorMetrics {
    polls: AtomicU64,
    events_emitted: AtomicU64,
    events_processed: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of a monitor's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub polls: u64,
    pub events_emitted: u64,
    pub events_processed: u64,
    pub errors: u64,
}

impl MonitorMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Create a shutdown signal pair for monitors.
///
/// Flip the sender to `true` to stop every monitor holding the receiver.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Announces new bucket keys as `NewFile` events
pub struct BucketMonitor {
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn MessageQueue>,
    bucket: String,
    notification_queue: QueueHandle,
    poll_interval: Duration,
    metrics: Arc<MonitorMetrics>,
}

impl BucketMonitor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        queue: Arc<dyn MessageQueue>,
        bucket: impl Into<String>,
        notification_queue: QueueHandle,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            bucket: bucket.into(),
            notification_queue,
            poll_interval,
            metrics: Arc::new(MonitorMetrics::default()),
        }
    }

    pub fn metrics(&self) -> Arc<MonitorMetrics> {
        self.metrics.clone()
    }

    /// Run until the shutdown signal flips to `true`
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(bucket = %self.bucket, "bucket monitor started");
            let mut known: HashSet<String> = HashSet::new();

            loop {
                self.poll(&mut known).await;

                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(bucket = %self.bucket, "bucket monitor stopped");
        })
    }

    async fn poll(&self, known: &mut HashSet<String>) {
        self.metrics.polls.fetch_add(1, Ordering::Relaxed);

        let keys = match self.store.list(&self.bucket).await {
            Ok(keys) => keys,
            Err(e) => {
                self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                warn!(bucket = %self.bucket, error = %e, "bucket poll failed");
                return;
            }
        };

        for key in keys {
            if !known.insert(key.clone()) {
                continue;
            }
            let event = QueueEvent::NewFile {
                bucket: self.bucket.clone(),
                key: key.clone(),
                at: Utc::now(),
            };
            match self.queue.send(&self.notification_queue, &event).await {
                Ok(_) => {
                    self.metrics.events_emitted.fetch_add(1, Ordering::Relaxed);
                    info!(bucket = %self.bucket, key, "new file announced");
                }
                Err(e) => {
                    self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(bucket = %self.bucket, key, error = %e, "failed to announce new file");
                    // Re-announce on the next poll
                    known.remove(&key);
                }
            }
        }
    }
}

/// Consumes and acknowledges pipeline events
pub struct QueueMonitor {
    queue: Arc<dyn MessageQueue>,
    watched_queue: QueueHandle,
    poll_interval: Duration,
    metrics: Arc<MonitorMetrics>,
}

impl QueueMonitor {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        watched_queue: QueueHandle,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            watched_queue,
            poll_interval,
            metrics: Arc::new(MonitorMetrics::default()),
        }
    }

    pub fn metrics(&self) -> Arc<MonitorMetrics> {
        self.metrics.clone()
    }

    /// Run until the shutdown signal flips to `true`
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(queue = %self.watched_queue, "queue monitor started");

            loop {
                self.poll().await;

                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(queue = %self.watched_queue, "queue monitor stopped");
        })
    }

    async fn poll(&self) {
        self.metrics.polls.fetch_add(1, Ordering::Relaxed);

        let messages = match self.queue.receive(&self.watched_queue).await {
            Ok(messages) => messages,
            Err(e) => {
                self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                warn!(queue = %self.watched_queue, error = %e, "queue poll failed");
                return;
            }
        };

        for message in messages {
            match &message.body {
                QueueEvent::NewFile { bucket, key, .. } => {
                    info!(bucket, key, "event: new file");
                }
                QueueEvent::DataProcessed {
                    input_key,
                    output_key,
                    record_count,
                    ..
                } => {
                    info!(input_key, output_key, record_count, "event: data processed");
                }
                QueueEvent::UploadFailed {
                    destination,
                    item_key,
                    attempts,
                    ..
                } => {
                    warn!(%destination, item_key, attempts, "event: upload failed");
                }
            }

            match self
                .queue
                .delete(&self.watched_queue, &message.receipt_handle)
                .await
            {
                Ok(_) => {
                    self.metrics.events_processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "failed to acknowledge event");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use havoc_core_interface::{Dataset, MemoryQueue, MemoryStore, Record};
    use serde_json::json;

    fn sample_dataset() -> Dataset {
        let mut r = Record::new();
        r.insert("transaction_id".into(), json!("TXN-1"));
        Dataset::from_records(vec![r])
    }

    #[tokio::test]
    async fn test_bucket_monitor_announces_new_keys_once() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let queue: Arc<dyn MessageQueue> = Arc::new(MemoryQueue::new());
        store.create_bucket("raw-data").await.unwrap();
        let events = queue.create_queue("events").await.unwrap();

        let monitor = BucketMonitor::new(
            store.clone(),
            queue.clone(),
            "raw-data",
            events.clone(),
            Duration::from_millis(10),
        );
        let metrics = monitor.metrics();
        let (tx, rx) = shutdown_channel();
        let handle = monitor.spawn(rx);

        store.put("raw-data", "a", &sample_dataset()).await.unwrap();
        store.put("raw-data", "b", &sample_dataset()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        tx.send(true).unwrap();
        handle.await.unwrap();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_emitted, 2);
        assert!(snapshot.polls >= 2);
        assert_eq!(snapshot.errors, 0);

        // Exactly one NewFile per key, despite repeated polls
        let messages = queue.receive(&events).await.unwrap();
        let mut keys: Vec<_> = messages
            .iter()
            .map(|m| match &m.body {
                QueueEvent::NewFile { key, .. } => key.clone(),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_queue_monitor_processes_and_acknowledges() {
        let queue: Arc<dyn MessageQueue> = Arc::new(MemoryQueue::new());
        let events = queue.create_queue("events").await.unwrap();

        for i in 0..3 {
            let event = QueueEvent::NewFile {
                bucket: "raw-data".to_string(),
                key: format!("file-{i}"),
                at: Utc::now(),
            };
            queue.send(&events, &event).await.unwrap();
        }

        let monitor = QueueMonitor::new(queue.clone(), events.clone(), Duration::from_millis(10));
        let metrics = monitor.metrics();
        let (tx, rx) = shutdown_channel();
        let handle = monitor.spawn(rx);

        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(metrics.snapshot().events_processed, 3);
        // Everything was acknowledged
        assert!(queue.receive(&events).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_stops_promptly() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let queue: Arc<dyn MessageQueue> = Arc::new(MemoryQueue::new());
        store.create_bucket("raw-data").await.unwrap();
        let events = queue.create_queue("events").await.unwrap();

        let monitor = BucketMonitor::new(
            store,
            queue,
            "raw-data",
            events,
            Duration::from_secs(300),
        );
        let (tx, rx) = shutdown_channel();
        let handle = monitor.spawn(rx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        // Stops despite the long poll interval
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_poll_errors_are_counted_not_fatal() {
        // Bucket never created: every list fails
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let queue: Arc<dyn MessageQueue> = Arc::new(MemoryQueue::new());
        let events = queue.create_queue("events").await.unwrap();

        let monitor = BucketMonitor::new(
            store,
            queue,
            "missing-bucket",
            events,
            Duration::from_millis(10),
        );
        let metrics = monitor.metrics();
        let (tx, rx) = shutdown_channel();
        let handle = monitor.spawn(rx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        let snapshot = metrics.snapshot();
        assert!(snapshot.errors >= 2);
        assert_eq!(snapshot.events_emitted, 0);
    }
}

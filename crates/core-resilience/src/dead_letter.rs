//! Dead-Letter Queue: quarantine for permanently-failed items
//!
//! When an operation exhausts its retry budget, the retry policy routes a
//! structured failure record to a [`DeadLetterSink`] instead of failing the
//! whole run. This enables partial success: the caller keeps going, and
//! dead-lettered items can be inspected or replayed later.
//!
//! [`DeadLetterQueue`] is the built-in in-memory sink: a bounded ring that
//! drops its oldest entry on overflow so it can never grow without bound.
//! Applications that want dead letters on a real queue implement the sink
//! trait over their message queue instead.

use crate::ResilienceError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::SystemTime;
use tokio::sync::Mutex;

/// A record describing an operation that failed after exhausting all retries
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetterRecord {
    /// Where the payload was headed (bucket, endpoint, ...)
    pub destination: String,

    /// Identity of the attempted payload (object key, item id, ...)
    pub item_key: String,

    /// Total attempts made before giving up
    pub attempts: u32,

    /// Last error message observed
    pub last_error: String,

    /// When the final attempt failed
    pub failed_at: SystemTime,
}

/// Destination for records representing operations that failed after
/// exhausting all retries
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish(&self, record: DeadLetterRecord) -> Result<(), ResilienceError>;
}

/// In-memory dead-letter sink with bounded capacity.
///
/// Entries beyond the capacity evict the oldest first. The caller drains the
/// queue periodically for reporting or replay.
#[derive(Debug)]
pub struct DeadLetterQueue {
    inner: Mutex<DeadLetterInner>,
    max_capacity: usize,
}

#[derive(Debug, Default)]
struct DeadLetterInner {
    entries: VecDeque<DeadLetterRecord>,
    total_received: u64,
    total_dropped: u64,
}

impl DeadLetterQueue {
    /// Create a new dead-letter queue with the given maximum capacity
    pub fn new(max_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(DeadLetterInner::default()),
            max_capacity,
        }
    }

    /// Drain all entries (for flushing to a report or replay)
    pub async fn drain(&self) -> Vec<DeadLetterRecord> {
        let mut inner = self.inner.lock().await;
        inner.entries.drain(..).collect()
    }

    /// Snapshot of all entries without removing them
    pub async fn entries(&self) -> Vec<DeadLetterRecord> {
        let inner = self.inner.lock().await;
        inner.entries.iter().cloned().collect()
    }

    /// Number of entries currently held
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Check if the queue is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    /// Get statistics
    pub async fn stats(&self) -> DeadLetterStats {
        let inner = self.inner.lock().await;
        DeadLetterStats {
            current_count: inner.entries.len(),
            max_capacity: self.max_capacity,
            total_received: inner.total_received,
            total_dropped: inner.total_dropped,
        }
    }
}

#[async_trait]
impl DeadLetterSink for DeadLetterQueue {
    async fn publish(&self, record: DeadLetterRecord) -> Result<(), ResilienceError> {
        let mut inner = self.inner.lock().await;
        inner.total_received += 1;

        if inner.entries.len() >= self.max_capacity {
            inner.entries.pop_front();
            inner.total_dropped += 1;
        }

        inner.entries.push_back(record);
        Ok(())
    }
}

/// Statistics for the dead-letter queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterStats {
    /// Current number of entries
    pub current_count: usize,
    /// Maximum capacity
    pub max_capacity: usize,
    /// Total entries ever received
    pub total_received: u64,
    /// Total entries dropped due to capacity overflow
    pub total_dropped: u64,
}

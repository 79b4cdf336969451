//! Message queue contract

use crate::{QueueEvent, Result};
use async_trait::async_trait;

/// Opaque handle to a created queue
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueHandle(String);

impl QueueHandle {
    /// Wrap a backend-specific queue identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The backend identifier (queue URL, name, ...)
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message delivered by [`MessageQueue::receive`].
///
/// The message stays in-flight until acknowledged via
/// [`MessageQueue::delete`] with its `receipt_handle`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub body: QueueEvent,
    pub receipt_handle: String,
}

/// At-least-once message delivery with explicit acknowledgement.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Create a queue, or return the handle of an existing one.
    async fn create_queue(&self, name: &str) -> Result<QueueHandle>;

    /// Enqueue an event. Returns the message id.
    async fn send(&self, queue: &QueueHandle, event: &QueueEvent) -> Result<String>;

    /// Receive up to a backend-defined batch of pending messages, moving them
    /// in-flight. An empty vec means the queue is currently drained.
    async fn receive(&self, queue: &QueueHandle) -> Result<Vec<ReceivedMessage>>;

    /// Acknowledge an in-flight message. Returns `false` for an unknown
    /// receipt handle.
    async fn delete(&self, queue: &QueueHandle, receipt_handle: &str) -> Result<bool>;
}

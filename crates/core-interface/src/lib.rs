//! Havoc Core Interface: contracts for external collaborators
//!
//! This crate defines the narrow interfaces Havoc uses to talk to the outside
//! world. The resilience and chaos layers never touch a concrete SDK; they
//! only see these traits:
//!
//! - [`ObjectStore`]: bucket/key storage for tabular payloads
//! - [`MessageQueue`]: at-least-once message delivery with explicit acks
//!
//! Both traits are implemented by deterministic in-memory backends
//! ([`MemoryStore`], [`MemoryQueue`]) used by tests, demos, and the CLI.
//! Fault decorators in `havoc-chaos` wrap any implementation behind the same
//! trait, so callers cannot tell a faulty dependency from a healthy one.
//!
//! # Example
//!
//! ```
//! use havoc_core_interface::{Dataset, MemoryStore, ObjectStore, Record};
//! use serde_json::json;
//!
//! # async fn example() -> havoc_core_interface::Result<()> {
//! let store = MemoryStore::new();
//! store.create_bucket("raw-data").await?;
//!
//! let mut dataset = Dataset::new();
//! let mut record = Record::new();
//! record.insert("id".into(), json!(1));
//! dataset.push(record);
//!
//! store.put("raw-data", "raw/batch-1", &dataset).await?;
//! assert_eq!(store.list("raw-data").await?, vec!["raw/batch-1".to_string()]);
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

pub mod dataset;
pub mod events;
pub mod memory;
pub mod message_queue;
pub mod object_store;

pub use dataset::{Dataset, Record};
pub use events::QueueEvent;
pub use memory::{MemoryQueue, MemoryStore};
pub use message_queue::{MessageQueue, QueueHandle, ReceivedMessage};
pub use object_store::ObjectStore;

/// Errors surfaced by collaborator operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CloudError {
    /// The named bucket does not exist
    #[error("bucket not found: {0}")]
    BucketMissing(String),

    /// The named queue does not exist
    #[error("queue not found: {0}")]
    QueueMissing(String),

    /// The service is unreachable. Raised by real outages and by injected
    /// service-failure faults (the `service` tag identifies the group).
    #[error("{service} service unavailable")]
    Unavailable { service: String },

    /// Payload could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CloudError {
    /// Convenience constructor for tagged outages
    pub fn unavailable(service: impl Into<String>) -> Self {
        CloudError::Unavailable {
            service: service.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

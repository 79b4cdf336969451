//! Tagged queue events
//!
//! Every message flowing through a [`crate::MessageQueue`] is one of these
//! variants, discriminated by the `event_type` field on the wire. Consumers
//! decode with an exhaustive `match`; there is no free-form payload shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message body on a Havoc queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum QueueEvent {
    /// A new object appeared in a monitored bucket
    NewFile {
        bucket: String,
        key: String,
        at: DateTime<Utc>,
    },

    /// The pipeline finished processing an input object
    DataProcessed {
        input_key: String,
        output_key: String,
        record_count: usize,
        at: DateTime<Utc>,
    },

    /// An upload exhausted its retry budget and was dead-lettered
    UploadFailed {
        destination: String,
        item_key: String,
        attempts: u32,
        at: DateTime<Utc>,
    },
}

impl QueueEvent {
    /// Stable name of the variant, matching the wire discriminant
    pub fn kind(&self) -> &'static str {
        match self {
            QueueEvent::NewFile { .. } => "NewFile",
            QueueEvent::DataProcessed { .. } => "DataProcessed",
            QueueEvent::UploadFailed { .. } => "UploadFailed",
        }
    }
}

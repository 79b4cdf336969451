//! Object storage contract

use crate::{Dataset, Result};
use async_trait::async_trait;

/// Bucket/key storage for tabular payloads.
///
/// Implementations must be safe to share across tasks (`Send + Sync`); all
/// methods take `&self`. Fault decorators in `havoc-chaos` wrap any
/// implementation behind this same trait.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket. Returns `false` if it already existed.
    async fn create_bucket(&self, name: &str) -> Result<bool>;

    /// Write a dataset under `bucket/key`, replacing any existing object.
    async fn put(&self, bucket: &str, key: &str, data: &Dataset) -> Result<()>;

    /// Read the dataset at `bucket/key`, or `None` if the key is absent.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Dataset>>;

    /// List all keys in a bucket, in lexicographic order.
    async fn list(&self, bucket: &str) -> Result<Vec<String>>;
}

//! Data corruption fault
//!
//! Mutates datasets in flight so downstream validation has something real to
//! catch. Each corrupted write picks one strategy uniformly at random;
//! whether a write is corrupted at all is an independent coin flip with the
//! configured probability. At probability 1.0 every write is visibly mutated,
//! at 0.0 the decorator is byte-for-byte pass-through.

use async_trait::async_trait;
use havoc_core_interface::{Dataset, ObjectStore, Result};
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// How a dataset gets mangled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionStrategy {
    /// Null out every value of a randomly chosen column
    NullColumns,
    /// Append duplicates of randomly sampled rows
    DuplicateRows,
    /// Drop the trailing half of the rows
    Truncate,
}

impl CorruptionStrategy {
    const ALL: [CorruptionStrategy; 3] = [
        CorruptionStrategy::NullColumns,
        CorruptionStrategy::DuplicateRows,
        CorruptionStrategy::Truncate,
    ];

    /// Apply this strategy to `data` in place.
    ///
    /// Guaranteed to change a non-empty dataset: `NullColumns` always picks
    /// an existing column, `DuplicateRows` always appends at least one row,
    /// `Truncate` always removes at least one row from a multi-row dataset.
    pub fn apply(&self, data: &mut Dataset, rng: &mut impl Rng) {
        if data.is_empty() {
            return;
        }
        match self {
            CorruptionStrategy::NullColumns => {
                if let Some(column) = data.columns().into_iter().choose(rng) {
                    for record in data.records_mut() {
                        if let Some(value) = record.get_mut(&column) {
                            *value = serde_json::Value::Null;
                        }
                    }
                }
            }
            CorruptionStrategy::DuplicateRows => {
                let count = data.len().min(5).max(1);
                let duplicates: Vec<_> = (0..count)
                    .map(|_| data.records()[rng.random_range(0..data.len())].clone())
                    .collect();
                data.records_mut().extend(duplicates);
            }
            CorruptionStrategy::Truncate => {
                let keep = (data.len() / 2).max(1);
                data.records_mut().truncate(keep);
            }
        }
    }
}

impl std::fmt::Display for CorruptionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorruptionStrategy::NullColumns => f.write_str("null_columns"),
            CorruptionStrategy::DuplicateRows => f.write_str("duplicate_rows"),
            CorruptionStrategy::Truncate => f.write_str("truncate"),
        }
    }
}

/// Decorator that probabilistically corrupts every written dataset
pub struct CorruptingStore {
    inner: Arc<dyn ObjectStore>,
    probability: f64,
    rng: Mutex<StdRng>,
}

impl CorruptingStore {
    /// Corrupt writes to `inner` with probability `probability` in [0, 1]
    pub fn new(inner: Arc<dyn ObjectStore>, probability: f64) -> Self {
        Self::with_rng(inner, probability, StdRng::from_os_rng())
    }

    /// Seeded variant for deterministic tests
    pub fn with_seed(inner: Arc<dyn ObjectStore>, probability: f64, seed: u64) -> Self {
        Self::with_rng(inner, probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(inner: Arc<dyn ObjectStore>, probability: f64, rng: StdRng) -> Self {
        Self {
            inner,
            probability,
            rng: Mutex::new(rng),
        }
    }

    /// The configured corruption probability
    pub fn probability(&self) -> f64 {
        self.probability
    }
}

#[async_trait]
impl ObjectStore for CorruptingStore {
    async fn create_bucket(&self, name: &str) -> Result<bool> {
        self.inner.create_bucket(name).await
    }

    async fn put(&self, bucket: &str, key: &str, data: &Dataset) -> Result<()> {
        let corrupted = {
            let mut rng = self.rng.lock().await;
            if rng.random_bool(self.probability.clamp(0.0, 1.0)) {
                let strategy = *CorruptionStrategy::ALL
                    .iter()
                    .choose(&mut *rng)
                    .expect("strategy list is non-empty");
                let mut mangled = data.clone();
                strategy.apply(&mut mangled, &mut *rng);
                warn!(bucket, key, %strategy, "corrupting dataset before write");
                Some(mangled)
            } else {
                None
            }
        };

        match corrupted {
            Some(mangled) => self.inner.put(bucket, key, &mangled).await,
            None => self.inner.put(bucket, key, data).await,
        }
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
    use havoc_core_interface::{MemoryStore, Record};
    use serde_json::json;

    fn sample_dataset(rows: usize) -> Dataset {
        let records = (0..rows)
            .map(|i| {
                let mut r = Record::new();
                r.insert("transaction_id".into(), json!(format!("TXN-{i}")));
                r.insert("amount".into(), json!(100.0 + i as f64));
                r
            })
            .collect();
        Dataset::from_records(records)
    }

    #[test]
    fn test_null_columns_nulls_whole_column() {
        let mut data = sample_dataset(4);
        let mut rng = StdRng::seed_from_u64(7);
        CorruptionStrategy::NullColumns.apply(&mut data, &mut rng);

        let nulled = data
            .columns()
            .into_iter()
            .filter(|c| data.column(c).iter().all(|v| v == &Some(&json!(null))))
            .count();
        assert_eq!(nulled, 1);
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn test_duplicate_rows_appends() {
        let mut data = sample_dataset(3);
        let mut rng = StdRng::seed_from_u64(7);
        CorruptionStrategy::DuplicateRows.apply(&mut data, &mut rng);

        assert_eq!(data.len(), 6);
        let ids: Vec<_> = data
            .records()
            .iter()
            .map(|r| r["transaction_id"].clone())
            .collect();
        // Every appended row is a copy of an original
        for id in &ids[3..] {
            assert!(ids[..3].contains(id));
        }
    }

    #[test]
    fn test_truncate_keeps_at_least_one_row() {
        let mut rng = StdRng::seed_from_u64(7);

        let mut data = sample_dataset(10);
        CorruptionStrategy::Truncate.apply(&mut data, &mut rng);
        assert_eq!(data.len(), 5);

        let mut single = sample_dataset(1);
        CorruptionStrategy::Truncate.apply(&mut single, &mut rng);
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_empty_dataset_is_untouched() {
        let mut data = Dataset::new();
        let mut rng = StdRng::seed_from_u64(7);
        for strategy in CorruptionStrategy::ALL {
            strategy.apply(&mut data, &mut rng);
            assert!(data.is_empty());
        }
    }

    #[tokio::test]
    async fn test_probability_one_always_corrupts() {
        let inner = Arc::new(MemoryStore::new());
        inner.create_bucket("raw-data").await.unwrap();
        let store = CorruptingStore::with_seed(inner.clone(), 1.0, 7);

        for i in 0..10 {
            let key = format!("batch-{i}");
            let original = sample_dataset(6);
            store.put("raw-data", &key, &original).await.unwrap();
            let stored = inner.get("raw-data", &key).await.unwrap().unwrap();
            assert_ne!(stored, original, "write {key} was not corrupted");
        }
    }

    #[tokio::test]
    async fn test_probability_zero_passes_through() {
        let inner = Arc::new(MemoryStore::new());
        inner.create_bucket("raw-data").await.unwrap();
        let store = CorruptingStore::with_seed(inner.clone(), 0.0, 7);

        let original = sample_dataset(6);
        store.put("raw-data", "batch", &original).await.unwrap();
        let stored = inner.get("raw-data", "batch").await.unwrap().unwrap();
        assert_eq!(stored, original);
    }
}

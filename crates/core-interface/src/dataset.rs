//! Row-oriented tabular payload
//!
//! A [`Dataset`] is an ordered list of JSON-object records: the payload shape
//! uploaded to object storage and mutated by the corruption injector. Keeping
//! rows as `serde_json` maps lets validation and corruption reason about
//! individual fields without committing to a schema.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single row: field name -> JSON value
pub type Record = serde_json::Map<String, serde_json::Value>;

/// An ordered collection of records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset(Vec<Record>);

impl Dataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create a dataset from existing records
    pub fn from_records(records: Vec<Record>) -> Self {
        Self(records)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the dataset has no records
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a record
    pub fn push(&mut self, record: Record) {
        self.0.push(record);
    }

    /// Borrow the records
    pub fn records(&self) -> &[Record] {
        &self.0
    }

    /// Mutably borrow the records
    pub fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.0
    }

    /// Union of field names across all records
    pub fn columns(&self) -> BTreeSet<String> {
        self.0
            .iter()
            .flat_map(|r| r.keys().cloned())
            .collect()
    }

    /// Values of a single column, in record order (`None` where absent)
    pub fn column(&self, name: &str) -> Vec<Option<&serde_json::Value>> {
        self.0.iter().map(|r| r.get(name)).collect()
    }
}

impl IntoIterator for Dataset {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

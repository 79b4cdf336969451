/*!
 * Transaction records: sample data generation, validation, enrichment
 */

use chrono::Utc;
use havoc_core_interface::{Dataset, Record};
use havoc_core_resilience::ResilienceError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use tracing::debug;

const DEPARTMENTS: [&str; 4] = ["IT", "HR", "Finance", "Marketing"];
const STATUSES: [&str; 3] = ["PENDING", "COMPLETED", "FAILED"];

/// Columns every dataset must carry to be processable
pub const REQUIRED_COLUMNS: [&str; 4] = ["transaction_id", "customer_id", "amount", "department"];

/// One transaction row, the typed view of a pipeline [`Record`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub customer_id: String,
    pub amount: f64,
    pub department: String,
    pub timestamp: String,
    pub status: String,
}

impl TransactionRecord {
    /// Convert into a dataset record
    pub fn into_record(self) -> Record {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            // A plain struct of scalars always serializes to an object
            _ => Record::new(),
        }
    }
}

/// Generate `num_records` random transactions
pub fn generate_sample_data(num_records: usize) -> Dataset {
    let mut rng = rand::rng();
    let now = Utc::now().to_rfc3339();

    let records = (0..num_records)
        .map(|i| {
            TransactionRecord {
                transaction_id: format!("TXN_{:06}", i + 1),
                customer_id: format!("CUST_{}", rng.random_range(1000..=9999)),
                amount: (rng.random_range(10.0..1000.0_f64) * 100.0).round() / 100.0,
                department: DEPARTMENTS[rng.random_range(0..DEPARTMENTS.len())].to_string(),
                timestamp: now.clone(),
                status: STATUSES[rng.random_range(0..STATUSES.len())].to_string(),
            }
            .into_record()
        })
        .collect();

    Dataset::from_records(records)
}

/// Validate a dataset before processing.
///
/// Violations are permanent: a dataset that fails here will fail identically
/// on every retry, so the caller must not re-attempt.
pub fn validate(data: &Dataset) -> Result<(), ResilienceError> {
    debug!(records = data.len(), "validating dataset");

    let columns = data.columns();
    for required in REQUIRED_COLUMNS {
        if !columns.contains(required) {
            return Err(ResilienceError::Validation(format!(
                "missing required column: {required}"
            )));
        }
    }

    for (index, record) in data.records().iter().enumerate() {
        let amount = record.get("amount").and_then(|v| v.as_f64());
        match amount {
            Some(a) if a > 0.0 => {}
            _ => {
                return Err(ResilienceError::Validation(format!(
                    "record {index} has a non-positive or non-numeric amount"
                )));
            }
        }
    }

    let mut seen = HashSet::new();
    for record in data.records() {
        if let Some(id) = record.get("transaction_id").and_then(|v| v.as_str()) {
            if !seen.insert(id.to_string()) {
                return Err(ResilienceError::Validation(format!(
                    "duplicate transaction_id: {id}"
                )));
            }
        } else {
            return Err(ResilienceError::Validation(
                "record has a null or non-string transaction_id".to_string(),
            ));
        }
    }

    Ok(())
}

/// Enrich a validated dataset with derived fields.
///
/// Adds `amount_category` (SMALL below 100, MEDIUM below 500, LARGE
/// otherwise) and a `processing_timestamp`.
pub fn enrich(data: &Dataset) -> Dataset {
    let processed_at = Utc::now().to_rfc3339();
    let records = data
        .records()
        .iter()
        .map(|record| {
            let mut enriched = record.clone();
            let amount = record.get("amount").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let category = if amount < 100.0 {
                "SMALL"
            } else if amount < 500.0 {
                "MEDIUM"
            } else {
                "LARGE"
            };
            enriched.insert("amount_category".to_string(), json!(category));
            enriched.insert("processing_timestamp".to_string(), json!(processed_at));
            enriched
        })
        .collect();
    Dataset::from_records(records)
}

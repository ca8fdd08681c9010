//! JSON record stores: input records in, evaluated results out.
//!
//! The result store keeps each record's input next to its result so a later
//! run can rebuild the evaluation ledger and skip unchanged records.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tnscheck_core::{EvaluationResult, InputRecord};
use tnscheck_engine::EvaluationLedger;

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordStore {
    pub records: Vec<InputRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoredResult {
    pub input: InputRecord,
    pub evaluated_at: DateTime<Utc>,
    pub result: EvaluationResult,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ResultStore {
    pub results: Vec<StoredResult>,
}

impl ResultStore {
    /// Rebuild a ledger from previously stored results.
    pub fn to_ledger(&self) -> EvaluationLedger {
        let mut ledger = EvaluationLedger::new();
        for stored in &self.results {
            ledger.insert(&stored.input, stored.result.clone());
        }
        ledger
    }
}

pub fn load_records(path: &Path) -> anyhow::Result<Vec<InputRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading record store {}", path.display()))?;
    let store: RecordStore = serde_json::from_str(&text)
        .with_context(|| format!("parsing record store {}", path.display()))?;
    Ok(store.records)
}

/// Load previous results; a missing file is an empty store.
pub fn load_results(path: &Path) -> anyhow::Result<ResultStore> {
    if !path.exists() {
        return Ok(ResultStore::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading result store {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing result store {}", path.display()))
}

pub fn save_results(path: &Path, store: &ResultStore) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(store)?;
    std::fs::write(path, text).with_context(|| format!("writing result store {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tnscheck_core::{CoherenceReport, Comparison};

    fn sample_record() -> InputRecord {
        InputRecord {
            application: "ACME".to_string(),
            database_id: "M19ACMP0".to_string(),
            current: "jdbc:oracle:thin:@HOSTA:1521/SRVA".to_string(),
            new: "jdbc:oracle:thin:@HOSTA:1521/SRVA".to_string(),
            ..Default::default()
        }
    }

    fn sample_result() -> EvaluationResult {
        EvaluationResult {
            valid: true,
            new_vs_current: Comparison::Equal,
            dr_vs_current: Comparison::NotApplicable,
            authority_check: Comparison::NotApplicable,
            error_kind: None,
            error_detail: None,
            coherence: CoherenceReport::default(),
            sides: Vec::new(),
        }
    }

    #[test]
    fn record_store_roundtrip() {
        let store = RecordStore {
            records: vec![sample_record()],
        };
        let json = serde_json::to_string_pretty(&store).unwrap();
        let parsed: RecordStore = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.records, store.records);
    }

    #[test]
    fn result_store_rebuilds_ledger() {
        let store = ResultStore {
            results: vec![StoredResult {
                input: sample_record(),
                evaluated_at: Utc::now(),
                result: sample_result(),
            }],
        };
        let ledger = store.to_ledger();
        assert_eq!(ledger.get(&sample_record()), Some(&sample_result()));

        let mut changed = sample_record();
        changed.new = "jdbc:oracle:thin:@HOSTB:1521/SRVA".to_string();
        assert!(ledger.get(&changed).is_none());
    }

    #[test]
    fn result_store_json_shape() {
        let store = ResultStore {
            results: vec![StoredResult {
                input: sample_record(),
                evaluated_at: Utc::now(),
                result: sample_result(),
            }],
        };
        let json = serde_json::to_string(&store).unwrap();
        assert!(json.contains("\"new_vs_current\":\"EQUAL\""));
        assert!(json.contains("\"evaluated_at\""));
        let parsed: ResultStore = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.results.len(), 1);
    }
}

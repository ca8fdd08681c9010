//! Caller-owned evaluation ledger.
//!
//! Resolution is expensive, so the orchestrator can be handed a ledger of
//! previous results keyed by application/database pair. A record whose
//! descriptor strings are unchanged since the stored result is not resolved
//! again. The ledger is explicit state owned by the caller, never a global;
//! batch evaluation writes each record's entry at most once.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tnscheck_core::{EvaluationResult, InputRecord};

struct Entry {
    fingerprint: u64,
    result: EvaluationResult,
}

#[derive(Default)]
pub struct EvaluationLedger {
    entries: HashMap<String, Entry>,
}

impl EvaluationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(record: &InputRecord) -> String {
        format!(
            "{}/{}",
            record.application.trim(),
            record.database_id.trim()
        )
    }

    /// Fingerprint of everything that feeds resolution: the three descriptor
    /// strings and the DR flag. Business fields that only affect advisory
    /// checks are deliberately included too — a changed application name
    /// changes the coherence verdicts.
    pub fn fingerprint(record: &InputRecord) -> u64 {
        let mut hasher = DefaultHasher::new();
        record.application.hash(&mut hasher);
        record.database_id.hash(&mut hasher);
        record.current.hash(&mut hasher);
        record.new.hash(&mut hasher);
        record.new_with_dr.hash(&mut hasher);
        record.services.hash(&mut hasher);
        record.dr_flag.hash(&mut hasher);
        hasher.finish()
    }

    /// Stored result for `record`, if its inputs are unchanged.
    pub fn get(&self, record: &InputRecord) -> Option<&EvaluationResult> {
        self.entries
            .get(&Self::key(record))
            .filter(|e| e.fingerprint == Self::fingerprint(record))
            .map(|e| &e.result)
    }

    pub fn insert(&mut self, record: &InputRecord, result: EvaluationResult) {
        self.entries.insert(
            Self::key(record),
            Entry {
                fingerprint: Self::fingerprint(record),
                result,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

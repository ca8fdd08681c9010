//! Input and output records of one evaluation.
//!
//! The input is a fixed-schema struct (absent business fields are explicit
//! `Option`s, never missing map keys); the output is a flat, fully populated
//! record ready for downstream persistence and reporting.

use serde::{Deserialize, Serialize};

use crate::coherence::Verdict;
use crate::compare::ResolvedIdentity;
use crate::descriptor::ConnectDescriptor;
use crate::error::ErrorKind;

/// One business record as handed over by the ingestion collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub application: String,
    pub database_id: String,
    /// Current connection string.
    pub current: String,
    /// Proposed new connection string.
    pub new: String,
    /// New connection string carrying the DR address, when one exists.
    #[serde(default)]
    pub new_with_dr: Option<String>,
    /// Reference service name from the inventory export, advisory only.
    #[serde(default)]
    pub services: Option<String>,
    /// `O`/`N` flag gating whether DR evaluation is attempted at all.
    #[serde(default)]
    pub dr_flag: Option<String>,
}

impl InputRecord {
    /// DR evaluation is attempted only when the flag says so.
    pub fn dr_enabled(&self) -> bool {
        self.dr_flag
            .as_deref()
            .is_some_and(|f| f.trim().eq_ignore_ascii_case("o"))
    }
}

/// Named role of one evaluated side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Current,
    New,
    NewDr,
    Authoritative,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Current => "Current",
            Side::New => "New",
            Side::NewDr => "NewDR",
            Side::Authoritative => "Authoritative",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a side's endpoint came from: a parsed descriptor, or a bare
/// host/port pair from the fleet inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SideSource {
    Descriptor(ConnectDescriptor),
    Endpoint { host: String, port: Option<u16> },
}

/// One evaluated side: its source and, when resolution ran, its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideResult {
    pub side: Side,
    pub source: SideSource,
    pub identity: Option<ResolvedIdentity>,
}

/// Endpoint-equivalence verdict for one pair of sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparison {
    Equal,
    Different,
    Error,
    NotApplicable,
}

/// Per-side naming-convention verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoherenceReport {
    pub host_primary: Verdict,
    pub host_dr: Verdict,
    pub service: Verdict,
}

impl Default for CoherenceReport {
    fn default() -> Self {
        Self {
            host_primary: Verdict::NotApplicable,
            host_dr: Verdict::NotApplicable,
            service: Verdict::NotApplicable,
        }
    }
}

/// The orchestrator's complete output for one business record.
///
/// Every field is always populated: comparisons fall back to `NotApplicable`
/// when a side is absent, and the first error encountered (in Current, New,
/// NewDR, Authoritative order) is recorded without being overwritten by later
/// steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub valid: bool,
    pub new_vs_current: Comparison,
    pub dr_vs_current: Comparison,
    /// Advisory: New primary SCAN against the fleet-inventory SCAN.
    pub authority_check: Comparison,
    pub error_kind: Option<ErrorKind>,
    pub error_detail: Option<String>,
    pub coherence: CoherenceReport,
    pub sides: Vec<SideResult>,
}

impl EvaluationResult {
    pub fn side(&self, side: Side) -> Option<&SideResult> {
        self.sides.iter().find(|s| s.side == side)
    }
}

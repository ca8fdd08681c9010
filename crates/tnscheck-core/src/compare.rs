//! Normalised comparison of resolved network identities.
//!
//! SCAN-level names are compared with the DNS domain suffix stripped: cluster
//! tooling and DNS report the same listener with and without the zone.
//! [`normalize_hostname`] is the shared first stage (trim, alias list, case)
//! and keeps the domain; only [`normalize_scan_name`] drops it.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ResolveError};

/// Result of resolving one declared host. Created fresh for every evaluation,
/// never cached inside the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    pub host: String,
    pub canonical_name: Option<String>,
    pub scan_name: Option<String>,
    pub error: Option<ResolveError>,
}

impl ResolvedIdentity {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            canonical_name: None,
            scan_name: None,
            error: None,
        }
    }

    /// Record a failure. The first error wins; later steps still run for
    /// diagnostics but never overwrite it.
    pub fn record_error(&mut self, kind: ErrorKind, detail: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(ResolveError::new(kind, detail));
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

/// Tri-state comparison outcome. `Incomparable` is a value, never a panic:
/// callers map it to their own `NotApplicable`/`Error` vocabulary, and must
/// never treat it as "different".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Match {
    Equal,
    Different,
    Incomparable,
}

/// Normalise a SCAN-level name: trim, keep the first token of a comma-delimited
/// alias list, strip the DNS domain suffix, lowercase.
pub fn normalize_scan_name(name: &str) -> Option<String> {
    let first = normalize_hostname(name)?;
    let label = first.split('.').next().unwrap_or(&first);
    (!label.is_empty()).then(|| label.to_string())
}

/// Normalise a full hostname: trim, keep the first comma token, lowercase.
/// The domain suffix is kept.
pub fn normalize_hostname(name: &str) -> Option<String> {
    let first = name.split(',').next().unwrap_or(name).trim();
    let first = first.trim_end_matches('.');
    (!first.is_empty()).then(|| first.to_ascii_lowercase())
}

/// Compare two SCAN names after normalisation.
pub fn compare_scan_names(a: Option<&str>, b: Option<&str>) -> Match {
    let na = a.and_then(normalize_scan_name);
    let nb = b.and_then(normalize_scan_name);
    match (na, nb) {
        (Some(na), Some(nb)) if na == nb => Match::Equal,
        (Some(_), Some(_)) => Match::Different,
        _ => Match::Incomparable,
    }
}

/// Compare two resolved identities at the SCAN level.
pub fn compare(a: &ResolvedIdentity, b: &ResolvedIdentity) -> Match {
    compare_scan_names(a.scan_name.as_deref(), b.scan_name.as_deref())
}

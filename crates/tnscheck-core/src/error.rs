//! Error classification shared by every stage of an evaluation.
//!
//! These are outcomes, not faults: the parser and comparator return them as
//! plain values, and the resolver converts process failures and timeouts into
//! this vocabulary at its boundary. No transport or OS-level error crosses a
//! component seam in any other shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Field intentionally blank, e.g. no DR configured. Benign.
    Empty,
    /// Descriptor unparseable. Blocks all resolution for that side.
    SyntaxError,
    /// DNS lookup produced no usable canonical-name line.
    CnameNotFound,
    /// Cluster query produced no SCAN name line.
    ScanNotFound,
    /// External lookup exceeded its deadline. Transient; callers may retry.
    LookupTimeout,
    /// Caller-supplied deadline expired before the lookup started.
    Cancelled,
    /// Two sides that should denote the same endpoint do not.
    EndpointMismatch,
    /// Naming-convention violation. Advisory, never blocks.
    NamingMismatch,
    /// Fleet-inventory lookup failed or returned no usable row.
    InventoryError,
}

impl ErrorKind {
    /// Advisory kinds are reported but never become a record's blocking error.
    pub fn is_advisory(self) -> bool {
        matches!(self, ErrorKind::NamingMismatch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Empty => "EMPTY",
            ErrorKind::SyntaxError => "SYNTAX_ERROR",
            ErrorKind::CnameNotFound => "CNAME_NOT_FOUND",
            ErrorKind::ScanNotFound => "SCAN_NOT_FOUND",
            ErrorKind::LookupTimeout => "LOOKUP_TIMEOUT",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::EndpointMismatch => "ENDPOINT_MISMATCH",
            ErrorKind::NamingMismatch => "NAMING_MISMATCH",
            ErrorKind::InventoryError => "INVENTORY_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified resolution failure with its human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct ResolveError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ResolveError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

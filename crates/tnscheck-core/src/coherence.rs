//! Naming-convention coherence checks.
//!
//! Advisory verification that observed names follow the organisational
//! convention derived from the application identifier and the database
//! identifier. A mismatch is reported with both expected and observed strings;
//! it never blocks an evaluation.
//!
//! Host rule: `lower(application) + sequence token + role suffix`, where the
//! sequence token is the trailing letter-plus-digits group of the database
//! identifier (`M19ACMP0` -> `P0`) and the suffix is `db` for the primary role,
//! `dr` for DR. Only the first DNS label is validated; the observed zone is
//! reused verbatim in the expected value.
//!
//! Service rule: `SRV_<TRIG>_<DATABASE>`, where `TRIG` is the first three
//! alphanumeric characters of the uppercased application identifier.

use serde::{Deserialize, Serialize};

use crate::descriptor::AddressRole;

/// Outcome of one coherence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Ok,
    Mismatch { expected: String, observed: String },
    NotApplicable,
}

impl Verdict {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Verdict::Mismatch { .. })
    }
}

/// Trailing letter-plus-digits group of a database identifier.
///
/// `M19ACMP0` -> `P0`, `M19ACCP12` -> `P12`. `None` when the identifier does
/// not end in such a group.
pub fn sequence_token(database_id: &str) -> Option<&str> {
    let s = database_id.trim();
    let digits_start = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    let letter_start = digits_start.checked_sub(1)?;
    if !s.is_char_boundary(letter_start) {
        return None;
    }
    s[letter_start..]
        .chars()
        .next()
        .filter(|c| c.is_ascii_alphabetic())?;
    Some(&s[letter_start..])
}

/// Check the observed host against the expected `<app><seq><db|dr>` label.
pub fn check_host_naming(
    application: &str,
    database_id: &str,
    role: AddressRole,
    observed_host: &str,
) -> Verdict {
    let app = application.trim();
    let observed = observed_host.trim();
    if app.is_empty() || observed.is_empty() {
        return Verdict::NotApplicable;
    }
    let Some(seq) = sequence_token(database_id) else {
        return Verdict::NotApplicable;
    };

    let suffix = match role {
        AddressRole::Primary => "db",
        AddressRole::Dr => "dr",
    };
    let expected_label = format!(
        "{}{}{}",
        app.to_ascii_lowercase(),
        seq.to_ascii_lowercase(),
        suffix
    );

    let observed_lower = observed.to_ascii_lowercase();
    let (observed_label, zone) = match observed_lower.split_once('.') {
        Some((label, zone)) => (label, Some(zone)),
        None => (observed_lower.as_str(), None),
    };

    if observed_label == expected_label {
        return Verdict::Ok;
    }

    // The rule validates only the host label; the zone is echoed back so the
    // diagnostic shows a complete expected FQDN.
    let expected = match zone {
        Some(zone) => format!("{expected_label}.{zone}"),
        None => expected_label,
    };
    Verdict::Mismatch {
        expected,
        observed: observed_lower,
    }
}

/// Check the observed service name against `SRV_<TRIG>_<DATABASE>`.
pub fn check_service_naming(application: &str, database_id: &str, observed_service: &str) -> Verdict {
    let app = application.trim();
    let database = database_id.trim();
    let observed = observed_service.trim();
    if app.is_empty() || database.is_empty() || observed.is_empty() {
        return Verdict::NotApplicable;
    }

    let trigram: String = app
        .to_ascii_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect();
    if trigram.len() < 3 {
        return Verdict::NotApplicable;
    }

    let expected = format!("SRV_{}_{}", trigram, database.to_ascii_uppercase());
    if observed.eq_ignore_ascii_case(&expected) {
        Verdict::Ok
    } else {
        Verdict::Mismatch {
            expected,
            observed: observed.to_string(),
        }
    }
}

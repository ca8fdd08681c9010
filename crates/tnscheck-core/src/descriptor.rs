//! Oracle JDBC/TNS connect-descriptor parser.
//!
//! Recognises the two forms the inventory export actually produces:
//!
//! - Short form: `jdbc:oracle:thin:@HOST[:PORT[/SERVICE | :SID]]`
//! - Descriptor form: `(DESCRIPTION=(ADDRESS=...)...(CONNECT_DATA=(SERVICE_NAME=...)))`
//!
//! Descriptor-form `ADDRESS=` blocks are nested parenthesis groups, so they are
//! extracted with an explicit depth counter over the character stream; a naive
//! substring search misreads nested blocks. Extracted values are verbatim
//! slices of the raw text.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

const SHORT_FORM_PREFIX: &str = "jdbc:oracle:thin:@";

/// Positional role of an address within one descriptor: the first address is
/// the primary endpoint, the second the disaster-recovery endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressRole {
    #[serde(rename = "Primaire")]
    Primary,
    #[serde(rename = "DR")]
    Dr,
}

impl AddressRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AddressRole::Primary => "Primaire",
            AddressRole::Dr => "DR",
        }
    }
}

impl std::fmt::Display for AddressRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One network address extracted from a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: Option<u16>,
    pub protocol: Option<String>,
}

/// Parsed representation of one raw connection string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectDescriptor {
    /// Original text, kept for diagnostics.
    pub raw: String,
    /// Ordered addresses: index 0 is primary, index 1 is DR.
    pub addresses: Vec<Address>,
    /// Service name shared by all addresses of the descriptor.
    pub service_name: Option<String>,
    pub valid: bool,
    /// Addresses beyond the two this domain supports. They are dropped from
    /// `addresses` but counted so the orchestrator can log the mismatch.
    pub extra_addresses: usize,
    pub error: Option<ErrorKind>,
}

impl ConnectDescriptor {
    fn invalid(raw: &str, error: ErrorKind) -> Self {
        Self {
            raw: raw.to_string(),
            addresses: Vec::new(),
            service_name: None,
            valid: false,
            extra_addresses: 0,
            error: Some(error),
        }
    }

    pub fn primary(&self) -> Option<&Address> {
        self.addresses.first()
    }

    pub fn dr(&self) -> Option<&Address> {
        self.addresses.get(1)
    }

    pub fn role_of(&self, index: usize) -> Option<AddressRole> {
        match index {
            0 => Some(AddressRole::Primary),
            1 => Some(AddressRole::Dr),
            _ => None,
        }
    }
}

/// Parse one raw connection string.
///
/// Empty input yields [`ErrorKind::Empty`] — a blank field is a normal
/// business case (no DR configured), distinct from a syntax error. Anything
/// non-empty that matches neither supported form yields
/// [`ErrorKind::SyntaxError`]. `valid == false` always implies `addresses`
/// is empty.
pub fn parse(raw: &str) -> ConnectDescriptor {
    let payload = unquote(raw);
    if payload.is_empty() {
        return ConnectDescriptor::invalid(raw, ErrorKind::Empty);
    }

    if let Some((address, service_name)) = parse_short_form(payload) {
        return ConnectDescriptor {
            raw: raw.to_string(),
            addresses: vec![address],
            service_name,
            valid: true,
            extra_addresses: 0,
            error: None,
        };
    }

    match parse_descriptor_form(payload) {
        Some(Ok((addresses, service_name, extra_addresses))) => {
            if extra_addresses > 0 {
                tracing::debug!(extra_addresses, "descriptor has more addresses than this domain supports");
            }
            ConnectDescriptor {
                raw: raw.to_string(),
                addresses,
                service_name: Some(service_name),
                valid: true,
                extra_addresses,
                error: None,
            }
        }
        Some(Err(kind)) => ConnectDescriptor::invalid(raw, kind),
        None => ConnectDescriptor::invalid(raw, ErrorKind::SyntaxError),
    }
}

/// Structural diagnostic for unparseable input: reports the first parenthesis
/// imbalance, if any. Used to enrich `SYNTAX_ERROR` details.
pub fn syntax_diagnostic(raw: &str) -> Option<String> {
    let mut depth = 0i32;
    for (i, c) in raw.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Some(format!("parentheses mismatch at position {i}"));
                }
            }
            _ => {}
        }
    }
    (depth != 0).then(|| "parentheses mismatch (unbalanced)".to_string())
}

/// Strip surrounding noise: whitespace, and a quoted payload if the text was
/// exported with quotes around the descriptor.
fn unquote(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.contains('"') {
        let mut parts = trimmed.split('"');
        parts.next();
        if let Some(inner) = parts.next() {
            return inner.trim();
        }
    }
    trimmed
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Short form: `jdbc:oracle:thin:@HOST`, `@HOST:PORT/SERVICE`, `@HOST:PORT:SID`.
fn parse_short_form(payload: &str) -> Option<(Address, Option<String>)> {
    let lower = payload.to_ascii_lowercase();
    let at = lower.find(SHORT_FORM_PREFIX)?;
    let after = payload[at + SHORT_FORM_PREFIX.len()..]
        .trim()
        .trim_end_matches(',')
        .trim();
    if after.is_empty() {
        return None;
    }

    // Bare host, no port or service.
    if after.chars().all(is_host_char) {
        return Some((
            Address {
                host: after.to_string(),
                port: None,
                protocol: None,
            },
            None,
        ));
    }

    // host:port/service or host:port:sid
    let (host, rest) = after.split_once(':')?;
    if host.is_empty() || !host.chars().all(is_host_char) {
        return None;
    }
    let digits_end = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let port: u16 = rest[..digits_end].parse().ok()?;
    let tail = &rest[digits_end..];
    let mut chars = tail.chars();
    match chars.next() {
        Some('/') | Some(':') => {}
        _ => return None,
    }
    let service = chars.as_str().trim();
    if service.is_empty() {
        return None;
    }

    Some((
        Address {
            host: host.to_string(),
            port: Some(port),
            protocol: None,
        },
        Some(service.to_string()),
    ))
}

/// Descriptor form: requires a `DESCRIPTION=` marker; returns `None` when the
/// marker is absent (not this form), `Some(Err(_))` when the marker is present
/// but a mandatory key is missing.
#[allow(clippy::type_complexity)]
fn parse_descriptor_form(
    payload: &str,
) -> Option<Result<(Vec<Address>, String, usize), ErrorKind>> {
    let lower = payload.to_ascii_lowercase();
    if !lower.contains("description=") {
        return None;
    }

    let blocks = extract_blocks(payload, "(address=");
    if blocks.is_empty() {
        return Some(Err(ErrorKind::SyntaxError));
    }

    let mut addresses = Vec::new();
    for block in &blocks {
        let Some(host) = extract_value(block, "host") else {
            // HOST is mandatory inside every address block.
            return Some(Err(ErrorKind::SyntaxError));
        };
        if addresses.len() < 2 {
            addresses.push(Address {
                host: host.to_string(),
                port: extract_value(block, "port").and_then(|p| p.parse().ok()),
                protocol: extract_value(block, "protocol").map(str::to_string),
            });
        }
    }

    let Some(service_name) = extract_value(payload, "service_name") else {
        return Some(Err(ErrorKind::SyntaxError));
    };

    let extra = blocks.len().saturating_sub(2);
    Some(Ok((addresses, service_name.to_string(), extra)))
}

/// Extract the content of every `token(...)` group at any nesting level,
/// tracking parenthesis depth explicitly so that nested groups inside a block
/// do not truncate it.
fn extract_blocks<'a>(text: &'a str, token: &str) -> Vec<&'a str> {
    let lower = text.to_ascii_lowercase();
    let bytes = text.as_bytes();
    let mut blocks = Vec::new();
    let mut i = 0;

    while let Some(found) = lower[i..].find(token) {
        let start = i + found + token.len();
        let mut depth = 1usize;
        let mut j = start;
        while j < bytes.len() && depth > 0 {
            match bytes[j] {
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ => {}
            }
            j += 1;
        }
        let end = if depth == 0 { j - 1 } else { j };
        blocks.push(&text[start..end]);
        i = j;
    }

    blocks
}

/// Extract `KEY=value` from a block; the value runs to the next parenthesis.
fn extract_value<'a>(block: &'a str, key: &str) -> Option<&'a str> {
    let lower = block.to_ascii_lowercase();
    let needle = format!("{key}=");
    let at = lower.find(&needle)? + needle.len();
    let rest = &block[at..];
    let end = rest.find(['(', ')']).unwrap_or(rest.len());
    let value = rest[..end].trim();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ADDRESS: &str = "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=H1)(PORT=1521))(ADDRESS=(PROTOCOL=TCP)(HOST=H2)(PORT=1521))(CONNECT_DATA=(SERVICE_NAME=SRV1)))";

    #[test]
    fn empty_input_is_benign() {
        let d = parse("");
        assert!(!d.valid);
        assert!(d.addresses.is_empty());
        assert_eq!(d.error, Some(ErrorKind::Empty));

        let d = parse("   ");
        assert_eq!(d.error, Some(ErrorKind::Empty));
    }

    #[test]
    fn short_form_bare_host() {
        let d = parse("jdbc:oracle:thin:@HOSTA");
        assert!(d.valid);
        assert_eq!(d.addresses.len(), 1);
        assert_eq!(d.addresses[0].host, "HOSTA");
        assert_eq!(d.addresses[0].port, None);
        assert_eq!(d.service_name, None);
    }

    #[test]
    fn short_form_host_port_service() {
        let d = parse("jdbc:oracle:thin:@HOSTA:1521/SRVA");
        assert!(d.valid);
        assert_eq!(d.addresses[0].host, "HOSTA");
        assert_eq!(d.addresses[0].port, Some(1521));
        assert_eq!(d.service_name.as_deref(), Some("SRVA"));
    }

    #[test]
    fn short_form_host_port_sid() {
        let d = parse("jdbc:oracle:thin:@hosta.corp.example.com:1525:ORCL");
        assert!(d.valid);
        assert_eq!(d.addresses[0].host, "hosta.corp.example.com");
        assert_eq!(d.addresses[0].port, Some(1525));
        assert_eq!(d.service_name.as_deref(), Some("ORCL"));
    }

    #[test]
    fn short_form_prefix_case_insensitive() {
        let d = parse("JDBC:ORACLE:THIN:@HOSTA:1521/SRVA");
        assert!(d.valid);
        assert_eq!(d.addresses[0].host, "HOSTA");
    }

    #[test]
    fn quoted_payload_is_unwrapped() {
        let d = parse("  \"jdbc:oracle:thin:@HOSTA:1521/SRVA\"  ");
        assert!(d.valid);
        assert_eq!(d.addresses[0].host, "HOSTA");
    }

    #[test]
    fn descriptor_form_two_addresses() {
        let d = parse(TWO_ADDRESS);
        assert!(d.valid);
        assert_eq!(d.addresses.len(), 2);
        assert_eq!(d.addresses[0].host, "H1");
        assert_eq!(d.addresses[1].host, "H2");
        assert_eq!(d.role_of(0), Some(AddressRole::Primary));
        assert_eq!(d.role_of(1), Some(AddressRole::Dr));
        assert_eq!(d.service_name.as_deref(), Some("SRV1"));
        assert_eq!(d.extra_addresses, 0);
    }

    #[test]
    fn descriptor_form_with_jdbc_prefix() {
        let raw = format!("jdbc:oracle:thin:@{TWO_ADDRESS}");
        let d = parse(&raw);
        assert!(d.valid);
        assert_eq!(d.addresses.len(), 2);
        assert_eq!(d.service_name.as_deref(), Some("SRV1"));
    }

    #[test]
    fn nested_groups_inside_address_do_not_truncate() {
        // Each address carries an incidental nested group; a non-depth-aware
        // scan would cut the block at the first ')' and lose fields after it.
        let raw = "(DESCRIPTION=\
                   (ADDRESS=(LOAD_BALANCE=(ON=yes)(MODE=x))(PROTOCOL=TCP)(HOST=H1)(PORT=1521))\
                   (ADDRESS=(FAILOVER=(RETRIES=3))(PROTOCOL=TCP)(HOST=H2)(PORT=1522))\
                   (CONNECT_DATA=(SERVICE_NAME=SRV1)))";
        let d = parse(raw);
        assert!(d.valid);
        assert_eq!(d.addresses.len(), 2);
        assert_eq!(d.addresses[0].host, "H1");
        assert_eq!(d.addresses[0].port, Some(1521));
        assert_eq!(d.addresses[1].host, "H2");
        assert_eq!(d.addresses[1].port, Some(1522));

        // The naive equivalent stops at the first closing paren and never
        // reaches the HOST key of the first block.
        let naive = raw.find("(ADDRESS=").map(|i| {
            let start = i + "(ADDRESS=".len();
            let end = raw[start..].find(')').unwrap() + start;
            &raw[start..end]
        });
        assert_eq!(naive, Some("(LOAD_BALANCE=(ON=yes"));
    }

    #[test]
    fn extracted_fields_appear_verbatim_in_raw() {
        let d = parse(TWO_ADDRESS);
        for addr in &d.addresses {
            assert!(d.raw.contains(&addr.host));
            if let Some(port) = addr.port {
                assert!(d.raw.contains(&port.to_string()));
            }
            if let Some(proto) = &addr.protocol {
                assert!(d.raw.contains(proto.as_str()));
            }
        }
    }

    #[test]
    fn address_list_wrapper_is_transparent() {
        let raw = "(DESCRIPTION=(ADDRESS_LIST=\
                   (ADDRESS=(PROTOCOL=TCP)(HOST=H1)(PORT=1521))\
                   (ADDRESS=(PROTOCOL=TCP)(HOST=H2)(PORT=1521)))\
                   (CONNECT_DATA=(SERVICE_NAME=SRV1)))";
        let d = parse(raw);
        assert!(d.valid);
        assert_eq!(d.addresses.len(), 2);
        assert_eq!(d.addresses[0].host, "H1");
        assert_eq!(d.addresses[1].host, "H2");
    }

    #[test]
    fn third_address_counted_not_kept() {
        let raw = "(DESCRIPTION=\
                   (ADDRESS=(HOST=H1)(PORT=1521))\
                   (ADDRESS=(HOST=H2)(PORT=1521))\
                   (ADDRESS=(HOST=H3)(PORT=1521))\
                   (CONNECT_DATA=(SERVICE_NAME=SRV1)))";
        let d = parse(raw);
        assert!(d.valid);
        assert_eq!(d.addresses.len(), 2);
        assert_eq!(d.extra_addresses, 1);
    }

    #[test]
    fn descriptor_missing_service_name_is_syntax_error() {
        let raw = "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(HOST=H1)(PORT=1521)))";
        let d = parse(raw);
        assert!(!d.valid);
        assert!(d.addresses.is_empty());
        assert_eq!(d.error, Some(ErrorKind::SyntaxError));
    }

    #[test]
    fn descriptor_missing_host_is_syntax_error() {
        let raw = "(DESCRIPTION=(ADDRESS=(PROTOCOL=TCP)(PORT=1521))(CONNECT_DATA=(SERVICE_NAME=SRV1)))";
        let d = parse(raw);
        assert!(!d.valid);
        assert_eq!(d.error, Some(ErrorKind::SyntaxError));
    }

    #[test]
    fn garbage_is_syntax_error() {
        let d = parse("not a descriptor at all");
        assert!(!d.valid);
        assert!(d.addresses.is_empty());
        assert_eq!(d.error, Some(ErrorKind::SyntaxError));
    }

    #[test]
    fn invalid_implies_no_addresses() {
        for raw in ["", "garbage", "jdbc:oracle:thin:@", "(DESCRIPTION=)"] {
            let d = parse(raw);
            if !d.valid {
                assert!(d.addresses.is_empty(), "raw={raw:?}");
            }
        }
    }

    #[test]
    fn syntax_diagnostic_reports_imbalance() {
        assert_eq!(syntax_diagnostic("(A=(B=1))"), None);
        assert_eq!(
            syntax_diagnostic("(A=1))"),
            Some("parentheses mismatch at position 5".to_string())
        );
        assert_eq!(
            syntax_diagnostic("((A=1)"),
            Some("parentheses mismatch (unbalanced)".to_string())
        );
    }
}

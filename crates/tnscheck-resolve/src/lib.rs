//! Identity resolution: declared host -> canonical name -> cluster SCAN name.
//!
//! The two steps are externally observable on purpose: the orchestrator can
//! attribute a failure to the DNS layer or the cluster layer, and tests can
//! substitute either capability independently. This crate is the only part of
//! the system that blocks on I/O; every call carries its own timeout and every
//! failure is classified into the shared [`ErrorKind`] vocabulary before it
//! leaves the resolver.

pub mod exec;

use std::time::Duration;

use thiserror::Error;
use tnscheck_core::{ErrorKind, ResolvedIdentity};
use tracing::debug;

pub use exec::{NslookupResolver, SqlplusInventory, SrvctlClusterQuery};

/// Failure of one external lookup, before classification into [`ErrorKind`].
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("cancelled before the lookup started")]
    Cancelled,
    #[error("{0}")]
    NotFound(String),
    #[error("tool invocation failed: {0}")]
    Tool(String),
}

/// Per-step deadlines. The cluster query runs a remote command and needs more
/// headroom than a DNS lookup.
#[derive(Debug, Clone, Copy)]
pub struct ResolveTimeouts {
    pub cname: Duration,
    pub scan: Duration,
    pub inventory: Duration,
}

impl Default for ResolveTimeouts {
    fn default() -> Self {
        Self {
            cname: Duration::from_secs(8),
            scan: Duration::from_secs(12),
            inventory: Duration::from_secs(20),
        }
    }
}

/// Canonical-name lookup capability (DNS layer).
#[allow(async_fn_in_trait)]
pub trait NameResolver {
    async fn lookup_canonical_name(
        &self,
        host: &str,
        timeout: Duration,
    ) -> Result<String, LookupError>;
}

/// Cluster-listener lookup capability. Queried against the resolved canonical
/// host, which identifies a node able to run the cluster tooling.
#[allow(async_fn_in_trait)]
pub trait ClusterQuery {
    async fn lookup_scan_name(
        &self,
        canonical_host: &str,
        timeout: Duration,
    ) -> Result<String, LookupError>;
}

/// Host/port pair for one database, as recorded by the fleet inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEndpoint {
    pub host: String,
    pub port: Option<u16>,
}

/// Authoritative endpoint lookup capability (fleet-management inventory).
#[allow(async_fn_in_trait)]
pub trait InventoryLookup {
    async fn lookup(
        &self,
        database_id: &str,
        timeout: Duration,
    ) -> Result<InventoryEndpoint, LookupError>;
}

/// Drives the resolution chain over the two injected capabilities.
#[derive(Debug, Clone)]
pub struct IdentityResolver<N, C> {
    names: N,
    cluster: C,
    timeouts: ResolveTimeouts,
}

impl<N: NameResolver, C: ClusterQuery> IdentityResolver<N, C> {
    pub fn new(names: N, cluster: C) -> Self {
        Self {
            names,
            cluster,
            timeouts: ResolveTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ResolveTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> ResolveTimeouts {
        self.timeouts
    }

    pub fn names(&self) -> &N {
        &self.names
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Resolve the canonical name of `host` through the DNS capability.
    pub async fn resolve_cname(&self, host: &str) -> Result<String, LookupError> {
        let raw = self
            .names
            .lookup_canonical_name(host, self.timeouts.cname)
            .await?;
        tidy_name(&raw)
            .ok_or_else(|| LookupError::NotFound(format!("empty canonical name for {host}")))
    }

    /// Resolve the SCAN name fronting `host`.
    ///
    /// A host that already names a SCAN listener is resolved through DNS; any
    /// other host is assumed to be a cluster node and queried with the cluster
    /// capability.
    pub async fn resolve_scan(&self, host: &str) -> Result<String, LookupError> {
        let raw = if host.to_ascii_lowercase().contains("scan") {
            self.names
                .lookup_canonical_name(host, self.timeouts.scan)
                .await?
        } else {
            self.cluster
                .lookup_scan_name(host, self.timeouts.scan)
                .await?
        };
        tidy_name(&raw).ok_or_else(|| LookupError::NotFound(format!("empty SCAN name for {host}")))
    }

    /// Walk one declared host through the full chain.
    ///
    /// Always returns a well-formed identity: failures are recorded on the
    /// identity, the first one wins, and later steps still run so the record
    /// carries as much diagnostic material as possible. The SCAN step uses the
    /// canonical name when resolution produced one, the declared host
    /// otherwise.
    pub async fn resolve_identity(&self, host: &str) -> ResolvedIdentity {
        let mut identity = ResolvedIdentity::new(host);

        match self.resolve_cname(host).await {
            Ok(name) => {
                debug!(host, cname = %name, "canonical name resolved");
                identity.canonical_name = Some(name);
            }
            Err(err) => {
                identity.record_error(
                    classify(&err, ErrorKind::CnameNotFound),
                    format!("cname resolution failed for {host}: {err}"),
                );
            }
        }

        let scan_input = identity
            .canonical_name
            .clone()
            .unwrap_or_else(|| host.to_string());
        match self.resolve_scan(&scan_input).await {
            Ok(name) => {
                debug!(host, scan = %name, "SCAN name resolved");
                identity.scan_name = Some(name);
            }
            Err(err) => {
                identity.record_error(
                    classify(&err, ErrorKind::ScanNotFound),
                    format!("SCAN resolution failed for {scan_input}: {err}"),
                );
            }
        }

        identity
    }
}

/// Map a lookup failure onto the shared error vocabulary; `not_found` is the
/// step-specific kind for a lookup that ran but produced nothing usable.
fn classify(err: &LookupError, not_found: ErrorKind) -> ErrorKind {
    match err {
        LookupError::Timeout(_) => ErrorKind::LookupTimeout,
        LookupError::Cancelled => ErrorKind::Cancelled,
        LookupError::NotFound(_) | LookupError::Tool(_) => not_found,
    }
}

/// Tidy a name as reported by external tooling: first token of a
/// comma-delimited alias list, trailing FQDN dot stripped. Case is preserved.
fn tidy_name(raw: &str) -> Option<String> {
    let first = raw.split(',').next().unwrap_or(raw).trim();
    let first = first.trim_end_matches('.');
    (!first.is_empty()).then(|| first.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubNames {
        reply: Option<String>,
        fail: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl NameResolver for StubNames {
        async fn lookup_canonical_name(
            &self,
            host: &str,
            timeout: Duration,
        ) -> Result<String, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail {
                Some("timeout") => Err(LookupError::Timeout(timeout)),
                Some(msg) => Err(LookupError::NotFound(msg.to_string())),
                None => Ok(self
                    .reply
                    .clone()
                    .unwrap_or_else(|| format!("{host}.corp.example.com."))),
            }
        }
    }

    #[derive(Default)]
    struct StubCluster {
        reply: Option<String>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl ClusterQuery for StubCluster {
        async fn lookup_scan_name(
            &self,
            _canonical_host: &str,
            _timeout: Duration,
        ) -> Result<String, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(LookupError::NotFound("no SCAN line".to_string()))
            } else {
                Ok(self
                    .reply
                    .clone()
                    .unwrap_or_else(|| "scan-db1.corp.example.com, scan-db1-vip".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn full_chain_resolves_cname_then_scan() {
        let resolver = IdentityResolver::new(StubNames::default(), StubCluster::default());
        let id = resolver.resolve_identity("hosta").await;
        assert_eq!(id.canonical_name.as_deref(), Some("hosta.corp.example.com"));
        assert_eq!(id.scan_name.as_deref(), Some("scan-db1.corp.example.com"));
        assert!(id.error.is_none());
    }

    #[tokio::test]
    async fn cname_failure_is_recorded_and_scan_still_attempted() {
        let names = StubNames {
            fail: Some("no Name line"),
            ..Default::default()
        };
        let resolver = IdentityResolver::new(names, StubCluster::default());
        let id = resolver.resolve_identity("hosta").await;
        assert_eq!(id.canonical_name, None);
        assert_eq!(id.error_kind(), Some(ErrorKind::CnameNotFound));
        // Diagnostic continuation: the SCAN step ran against the declared host.
        assert_eq!(id.scan_name.as_deref(), Some("scan-db1.corp.example.com"));
    }

    #[tokio::test]
    async fn scan_failure_after_cname_success() {
        let cluster = StubCluster {
            fail: true,
            ..Default::default()
        };
        let resolver = IdentityResolver::new(StubNames::default(), cluster);
        let id = resolver.resolve_identity("hosta").await;
        assert_eq!(id.canonical_name.as_deref(), Some("hosta.corp.example.com"));
        assert_eq!(id.scan_name, None);
        assert_eq!(id.error_kind(), Some(ErrorKind::ScanNotFound));
    }

    #[tokio::test]
    async fn timeout_classified_distinctly() {
        let names = StubNames {
            fail: Some("timeout"),
            ..Default::default()
        };
        let resolver = IdentityResolver::new(names, StubCluster::default());
        let id = resolver.resolve_identity("hosta").await;
        assert_eq!(id.error_kind(), Some(ErrorKind::LookupTimeout));
    }

    #[tokio::test]
    async fn scan_host_bypasses_cluster_query() {
        // A canonical name that already names a SCAN listener is resolved
        // through DNS; the cluster capability must not be invoked.
        let names = StubNames {
            reply: Some("scan-db1.corp.example.com".to_string()),
            ..Default::default()
        };
        let resolver = IdentityResolver::new(names, StubCluster::default());
        let id = resolver.resolve_identity("hosta").await;
        assert_eq!(id.scan_name.as_deref(), Some("scan-db1.corp.example.com"));
        assert_eq!(resolver.cluster.calls.load(Ordering::SeqCst), 0);
        assert!(id.error.is_none());
    }

    #[test]
    fn tidy_name_strips_aliases_and_trailing_dot() {
        assert_eq!(
            tidy_name("hosta.corp.example.com., alias1, alias2"),
            Some("hosta.corp.example.com".to_string())
        );
        assert_eq!(tidy_name("  "), None);
        assert_eq!(tidy_name("HostA"), Some("HostA".to_string()));
    }
}

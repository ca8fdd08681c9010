//! Resolution orchestrator.
//!
//! Drives one business record through parse, resolve, compare, and coherence
//! stages and always lands on a complete [`EvaluationResult`]. Per-record
//! evaluation shares no mutable state, so any number of records can be in
//! flight concurrently; the only shared resource, the
//! [`EvaluationLedger`](ledger::EvaluationLedger), stays with the caller and
//! is written once per record after its evaluation finishes.
//!
//! Stage order per record: parse Current and New (syntax short-circuit here),
//! select the DR address, resolve Current, New, DR, then the authoritative
//! inventory side, compare, check naming coherence. The first non-advisory
//! error in Current, New, NewDR, Authoritative order becomes the record's
//! error; later stages still run for diagnostics but never overwrite it.

pub mod ledger;

use std::time::Duration;

use futures::StreamExt;
use tnscheck_core::{
    CoherenceReport, Comparison, ConnectDescriptor, ErrorKind, EvaluationResult, InputRecord,
    Match, ResolvedIdentity, Side, SideResult, SideSource, check_host_naming,
    check_service_naming,
    compare::compare as compare_identities,
    descriptor::{Address, AddressRole, parse, syntax_diagnostic},
};
use tnscheck_resolve::{
    ClusterQuery, IdentityResolver, InventoryEndpoint, InventoryLookup, LookupError, NameResolver,
};
use tracing::{info, warn};

pub use ledger::EvaluationLedger;

/// Placeholder inventory for deployments without a fleet-management
/// repository; every lookup reports the capability as absent.
pub struct NoInventory;

impl InventoryLookup for NoInventory {
    async fn lookup(
        &self,
        _database_id: &str,
        _timeout: Duration,
    ) -> Result<InventoryEndpoint, LookupError> {
        Err(LookupError::NotFound("no inventory configured".to_string()))
    }
}

pub struct Orchestrator<N, C> {
    resolver: IdentityResolver<N, C>,
}

impl<N: NameResolver, C: ClusterQuery> Orchestrator<N, C> {
    pub fn new(resolver: IdentityResolver<N, C>) -> Self {
        Self { resolver }
    }

    /// Evaluate one record without an authoritative inventory side.
    pub async fn evaluate_offline(&self, record: &InputRecord) -> EvaluationResult {
        self.evaluate(record, None::<&NoInventory>).await
    }

    /// Evaluate one record. Never fails: every outcome, including total
    /// resolution failure, is a well-formed result.
    pub async fn evaluate<I: InventoryLookup>(
        &self,
        record: &InputRecord,
        inventory: Option<&I>,
    ) -> EvaluationResult {
        let current = parse(&record.current);
        let new = parse(&record.new);

        if current.extra_addresses > 0 || new.extra_addresses > 0 {
            warn!(
                application = %record.application,
                current_extra = current.extra_addresses,
                new_extra = new.extra_addresses,
                "descriptor declares more addresses than the two this check evaluates"
            );
        }

        let (Some(cur_addr), Some(new_addr)) = (current.primary().cloned(), new.primary().cloned())
        else {
            return short_circuit(record, current, new);
        };

        let mut first_error: Option<(ErrorKind, String)> = None;

        // DR side selection: positional (second address of New) first, the
        // separate DR descriptor field as fallback.
        let dr_descriptor = record
            .new_with_dr
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse);
        let mut dr_address: Option<Address> = None;
        let mut dr_source: Option<SideSource> = None;
        let mut dr_parse_error: Option<String> = None;
        if record.dr_enabled() {
            if let Some(addr) = new.dr() {
                dr_address = Some(addr.clone());
                dr_source = Some(SideSource::Descriptor(new.clone()));
            } else if let Some(desc) = &dr_descriptor {
                if desc.valid {
                    dr_address = desc.dr().or_else(|| desc.primary()).cloned();
                    dr_source = Some(SideSource::Descriptor(desc.clone()));
                } else if desc.error != Some(ErrorKind::Empty) {
                    dr_parse_error =
                        Some(describe_syntax_error(Side::NewDr, &desc.raw));
                    dr_source = Some(SideSource::Descriptor(desc.clone()));
                }
            }
        }

        // Resolution, in side order. Each failure is recorded on its identity
        // and, if it is the first, on the record.
        let cur_id = self.resolver.resolve_identity(&cur_addr.host).await;
        note_identity(&mut first_error, Side::Current, &cur_id);

        let new_id = self.resolver.resolve_identity(&new_addr.host).await;
        note_identity(&mut first_error, Side::New, &new_id);

        let dr_id = match &dr_address {
            Some(addr) => {
                let id = self.resolver.resolve_identity(&addr.host).await;
                note_identity(&mut first_error, Side::NewDr, &id);
                Some(id)
            }
            None => {
                if let Some(detail) = dr_parse_error {
                    note(&mut first_error, ErrorKind::SyntaxError, detail);
                }
                None
            }
        };

        let mut authority_side: Option<SideResult> = None;
        let mut auth_id: Option<ResolvedIdentity> = None;
        if let Some(inv) = inventory {
            let database_id = record.database_id.trim();
            if !database_id.is_empty() {
                match inv
                    .lookup(database_id, self.resolver.timeouts().inventory)
                    .await
                {
                    Ok(endpoint) => {
                        let id = self.resolver.resolve_identity(&endpoint.host).await;
                        note_identity(&mut first_error, Side::Authoritative, &id);
                        authority_side = Some(SideResult {
                            side: Side::Authoritative,
                            source: SideSource::Endpoint {
                                host: endpoint.host,
                                port: endpoint.port,
                            },
                            identity: Some(id.clone()),
                        });
                        auth_id = Some(id);
                    }
                    Err(err) => {
                        let kind = match err {
                            LookupError::Timeout(_) => ErrorKind::LookupTimeout,
                            LookupError::Cancelled => ErrorKind::Cancelled,
                            _ => ErrorKind::InventoryError,
                        };
                        note(
                            &mut first_error,
                            kind,
                            format!("Authoritative: inventory lookup failed for {database_id}: {err}"),
                        );
                    }
                }
            }
        }

        // Endpoint verdicts. A Different on the New side is the record's
        // error unless an earlier side already failed.
        let new_vs_current = endpoint_comparison(&cur_id, &new_id);
        if new_vs_current == Comparison::Different {
            note(
                &mut first_error,
                ErrorKind::EndpointMismatch,
                "Current and New resolve to different SCAN names".to_string(),
            );
        }
        let dr_vs_current = match &dr_id {
            Some(id) => endpoint_comparison(&cur_id, id),
            None => Comparison::NotApplicable,
        };
        let authority_check = match &auth_id {
            Some(id) => endpoint_comparison(&new_id, id),
            None => Comparison::NotApplicable,
        };

        // Advisory naming coherence, observed on the declared New hosts.
        let coherence = CoherenceReport {
            host_primary: check_host_naming(
                &record.application,
                &record.database_id,
                AddressRole::Primary,
                &new_addr.host,
            ),
            host_dr: match &dr_address {
                Some(addr) => check_host_naming(
                    &record.application,
                    &record.database_id,
                    AddressRole::Dr,
                    &addr.host,
                ),
                None => tnscheck_core::Verdict::NotApplicable,
            },
            service: check_service_naming(
                &record.application,
                &record.database_id,
                new.service_name
                    .as_deref()
                    .or(record.services.as_deref())
                    .unwrap_or(""),
            ),
        };

        let mut sides = vec![
            SideResult {
                side: Side::Current,
                source: SideSource::Descriptor(current),
                identity: Some(cur_id),
            },
            SideResult {
                side: Side::New,
                source: SideSource::Descriptor(new),
                identity: Some(new_id),
            },
        ];
        if let Some(source) = dr_source {
            sides.push(SideResult {
                side: Side::NewDr,
                source,
                identity: dr_id,
            });
        }
        if let Some(side) = authority_side {
            sides.push(side);
        }

        let (error_kind, error_detail) = match first_error {
            Some((kind, detail)) => (Some(kind), Some(detail)),
            None => (None, None),
        };

        info!(
            application = %record.application,
            database = %record.database_id,
            new_vs_current = ?new_vs_current,
            dr_vs_current = ?dr_vs_current,
            error = ?error_kind,
            "record evaluated"
        );

        EvaluationResult {
            valid: true,
            new_vs_current,
            dr_vs_current,
            authority_check,
            error_kind,
            error_detail,
            coherence,
            sides,
        }
    }

    /// Evaluate a batch with bounded concurrency, reusing ledger entries for
    /// unchanged records. Each record fails on its own; the batch never
    /// aborts. Results come back in input order.
    pub async fn evaluate_batch<I: InventoryLookup>(
        &self,
        records: &[InputRecord],
        inventory: Option<&I>,
        ledger: &mut EvaluationLedger,
        concurrency: usize,
    ) -> Vec<EvaluationResult> {
        let mut results: Vec<Option<EvaluationResult>> =
            records.iter().map(|r| ledger.get(r).cloned()).collect();
        let pending: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_none())
            .map(|(i, _)| i)
            .collect();
        info!(
            total = records.len(),
            cached = records.len() - pending.len(),
            to_evaluate = pending.len(),
            "starting batch evaluation"
        );

        let fresh: Vec<(usize, EvaluationResult)> =
            futures::stream::iter(pending.into_iter().map(|i| {
                let record = &records[i];
                async move { (i, self.evaluate(record, inventory).await) }
            }))
            .buffered(concurrency.max(1))
            .collect()
            .await;

        for (i, result) in fresh {
            ledger.insert(&records[i], result.clone());
            results[i] = Some(result);
        }
        results
            .into_iter()
            .map(|r| r.expect("every record is either cached or freshly evaluated"))
            .collect()
    }
}

fn describe_syntax_error(side: Side, raw: &str) -> String {
    match syntax_diagnostic(raw) {
        Some(diag) => format!("{side}: invalid connect descriptor syntax ({diag})"),
        None => format!("{side}: invalid connect descriptor syntax"),
    }
}

/// Terminal state for unparseable Current or New: no resolution is attempted.
fn short_circuit(
    record: &InputRecord,
    current: ConnectDescriptor,
    new: ConnectDescriptor,
) -> EvaluationResult {
    let detail = if !current.valid {
        describe_syntax_error(Side::Current, &current.raw)
    } else {
        describe_syntax_error(Side::New, &new.raw)
    };
    warn!(
        application = %record.application,
        database = %record.database_id,
        %detail,
        "syntax short-circuit, resolution skipped"
    );
    EvaluationResult {
        valid: false,
        new_vs_current: Comparison::Error,
        dr_vs_current: Comparison::NotApplicable,
        authority_check: Comparison::NotApplicable,
        error_kind: Some(ErrorKind::SyntaxError),
        error_detail: Some(detail),
        coherence: CoherenceReport::default(),
        sides: vec![
            SideResult {
                side: Side::Current,
                source: SideSource::Descriptor(current),
                identity: None,
            },
            SideResult {
                side: Side::New,
                source: SideSource::Descriptor(new),
                identity: None,
            },
        ],
    }
}

fn note(first: &mut Option<(ErrorKind, String)>, kind: ErrorKind, detail: String) {
    if first.is_none() && !kind.is_advisory() {
        *first = Some((kind, detail));
    }
}

fn note_identity(first: &mut Option<(ErrorKind, String)>, side: Side, identity: &ResolvedIdentity) {
    if let Some(err) = &identity.error {
        note(first, err.kind, format!("{side}: {}", err.detail));
    }
}

/// Map the comparator's tri-state onto the record vocabulary. A side that
/// failed to resolve makes the pair `Error`, as does an incomparable pair —
/// incomparability between two sides that were both evaluated means one of
/// them produced nothing, never that they are different.
fn endpoint_comparison(a: &ResolvedIdentity, b: &ResolvedIdentity) -> Comparison {
    if a.error.is_some() || b.error.is_some() {
        return Comparison::Error;
    }
    match compare_identities(a, b) {
        Match::Equal => Comparison::Equal,
        Match::Different => Comparison::Different,
        Match::Incomparable => Comparison::Error,
    }
}

//! Service layer
//!
//! `VigenzaService` runs the data flow end to end: raw acts are ingested into
//! the graph, raw clauses are parsed, classified, resolved and attached, and
//! status queries are answered from a consistent snapshot. Failures on a
//! single clause or provision never abort a batch; they are recorded as
//! anomalies.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use vigenza_engine::{Batch, NormStatus, VigenzaService};
//!
//! let batch = Batch::from_yaml_str(r#"
//! acts:
//!   - id: legge:1991;14
//!     enactment_date: 1991-02-10
//!     articles:
//!       - number: "1"
//!       - number: "14"
//! clauses:
//!   - source_act_id: legge:2020;77
//!     destination_text: "l'articolo 14 è abrogato"
//!     effective_date: 2021-01-01
//!     target_act_id: legge:1991;14
//! "#).unwrap();
//!
//! let service = VigenzaService::new();
//! service.ingest_batch(&batch);
//!
//! let on = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
//! let art1 = "urn:nir:stato:legge:1991;14~art1".parse().unwrap();
//! let art14 = "urn:nir:stato:legge:1991;14~art14".parse().unwrap();
//! assert_eq!(service.get_status(&art1, on).unwrap().status, NormStatus::InForce);
//! assert_eq!(service.get_status(&art14, on).unwrap().status, NormStatus::Repealed);
//! ```

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;

use crate::anomaly::{Anomaly, AnomalyLog, AnomalyReason};
use crate::classifier::classify_or_unknown;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::{ActIngest, Amendment, AmendmentEdge, GraphBuilder, GraphSnapshot, MemoryStore, NormStore};
use crate::identifier::{ActId, NormId};
use crate::parser::{parse_destination, DestinationRef};
use crate::resolver::resolve;
use crate::status::{StatusReport, StatusResolver};
use crate::types::{AmendmentKind, Batch, Norm, RawAct, RawAmendmentClause};

/// Counts for one [`VigenzaService::ingest_batch`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub acts: usize,
    pub norms: usize,
    pub clauses: usize,
    /// Edges added by this batch (duplicates of existing edges excluded)
    pub edges: usize,
    /// Clauses or provisions that produced an anomaly instead of an edge
    pub rejected: usize,
}

/// Engine façade over a [`NormStore`].
pub struct VigenzaService<S: NormStore = MemoryStore> {
    builder: GraphBuilder<S>,
    anomalies: AnomalyLog,
}

impl Default for VigenzaService<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl VigenzaService<MemoryStore> {
    /// In-memory service with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }
}

impl<S: NormStore> VigenzaService<S> {
    pub fn with_store(store: S, config: EngineConfig) -> Self {
        Self {
            builder: GraphBuilder::new(store, config),
            anomalies: AnomalyLog::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.builder.config()
    }

    /// Current graph snapshot.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.builder.snapshot()
    }

    /// Create or merge a single norm.
    ///
    /// # Errors
    ///
    /// Returns `VigenzaError::StoreConflict` when retries are exhausted.
    pub fn upsert_norm(&self, norm: Norm) -> Result<NormId> {
        self.builder.upsert_norm(norm)
    }

    /// Ingest the structure of one act. Provisions with malformed numbers
    /// are skipped and recorded as anomalies.
    ///
    /// # Errors
    ///
    /// Returns `VigenzaError::InvalidIdentifier` if the act id is malformed.
    pub fn ingest_act(&self, raw: &RawAct) -> Result<ActIngest> {
        let report = self.builder.ingest_act(raw)?;
        for detail in &report.rejected {
            let mut anomaly = Anomaly {
                norm_id: None,
                sequence: None,
                reason: AnomalyReason::InvalidIdentifier {
                    detail: detail.clone(),
                },
            };
            if let Some(act) = &report.act {
                anomaly = anomaly.with_norm(act.clone());
            }
            self.anomalies.record(anomaly);
        }
        Ok(report)
    }

    /// Resolve `destination` and attach an amendment edge from `source`.
    ///
    /// When the destination does not cite an act, the resolver searches the
    /// graph for the single act that has the cited article; use
    /// [`DestinationRef::with_default_act`] to bind it to a known act.
    ///
    /// # Errors
    ///
    /// - `VigenzaError::AmbiguousReference` / `UnresolvedReference` from
    ///   resolution
    /// - `VigenzaError::StoreConflict` when retries are exhausted
    pub fn attach_amendment(
        &self,
        source: &NormId,
        destination: &DestinationRef,
        amendment: Amendment,
    ) -> Result<AmendmentEdge> {
        let snapshot = self.builder.snapshot();
        self.attach_with(&snapshot, source, destination, amendment)
    }

    /// Attach an amendment whose destination is bound against `snapshot`.
    fn attach_with(
        &self,
        snapshot: &GraphSnapshot,
        source: &NormId,
        destination: &DestinationRef,
        amendment: Amendment,
    ) -> Result<AmendmentEdge> {
        let resolution = resolve(snapshot, destination, None)?;
        if resolution.is_stub() {
            tracing::debug!(norm_id = %resolution.norm_id(), "Target not ingested yet, creating stub");
        }
        let (edge, _) = self
            .builder
            .attach_resolved(source, resolution.norm_id(), &amendment)?;
        Ok(edge)
    }

    /// Parse, classify, resolve and attach one raw clause.
    ///
    /// `sequence` is the clause position in its batch; it orders amendments
    /// that take effect on the same day. Every failure is recorded as an
    /// anomaly before it is returned. An unrecognized verb is not a failure:
    /// the edge is attached with kind `unknown` and the anomaly recorded.
    ///
    /// # Errors
    ///
    /// Returns the first error that prevented attaching an edge.
    pub fn ingest_clause(&self, clause: &RawAmendmentClause, sequence: u64) -> Result<AmendmentEdge> {
        let snapshot = self.builder.snapshot();
        self.ingest_clause_with(&snapshot, clause, sequence)
    }

    fn ingest_clause_with(
        &self,
        snapshot: &GraphSnapshot,
        clause: &RawAmendmentClause,
        sequence: u64,
    ) -> Result<AmendmentEdge> {
        self.process_clause(snapshot, clause, sequence).map_err(|e| {
            self.anomalies
                .record(Anomaly::for_clause(sequence, AnomalyReason::from(&e)));
            e
        })
    }

    fn process_clause(
        &self,
        snapshot: &GraphSnapshot,
        clause: &RawAmendmentClause,
        sequence: u64,
    ) -> Result<AmendmentEdge> {
        let source_act: ActId = clause.source_act_id.parse()?;
        let source = match &clause.source_article {
            Some(article) => NormId::article_of(source_act, article.parse()?),
            None => NormId::act(source_act),
        };

        let mut destination = parse_destination(&clause.destination_text)?;
        if let Some(target) = &clause.target_act_id {
            let target: ActId = target.parse()?;
            destination = destination.with_default_act(&target);
        }

        let kind = classify_or_unknown(&clause.destination_text);

        let amendment = Amendment {
            kind,
            effective_date: clause.effective_date,
            raw_text: clause.destination_text.clone(),
            sequence,
        };
        let edge = self.attach_with(snapshot, &source, &destination, amendment)?;
        if kind == AmendmentKind::Unknown {
            self.anomalies.record(
                Anomaly::for_clause(
                    sequence,
                    AnomalyReason::UnclassifiedAmendment {
                        text: clause.destination_text.clone(),
                    },
                )
                .with_norm(edge.target.clone()),
            );
        }
        Ok(edge)
    }

    /// Ingest a whole batch: every act first, then every clause.
    ///
    /// Acts and clauses are processed in parallel. Every clause is bound
    /// against the snapshot taken once the acts are in, so stubs created by
    /// sibling clauses never steer resolution. Each clause's sequence is its
    /// position in `batch.clauses`; together the results do not depend on
    /// scheduling.
    pub fn ingest_batch(&self, batch: &Batch) -> BatchReport {
        let edges_before = self.builder.snapshot().edge_count();

        let acts: Vec<Result<ActIngest>> = batch
            .acts
            .par_iter()
            .map(|raw| {
                self.ingest_act(raw).map_err(|e| {
                    self.anomalies.record(Anomaly {
                        norm_id: None,
                        sequence: None,
                        reason: AnomalyReason::from(&e),
                    });
                    e
                })
            })
            .collect();

        let bound_against = self.builder.snapshot();
        let clauses: Vec<Result<AmendmentEdge>> = batch
            .clauses
            .par_iter()
            .enumerate()
            .map(|(i, clause)| self.ingest_clause_with(&bound_against, clause, i as u64))
            .collect();

        let mut report = BatchReport {
            clauses: batch.clauses.len(),
            edges: self.builder.snapshot().edge_count() - edges_before,
            ..BatchReport::default()
        };
        for act in &acts {
            match act {
                Ok(ingest) => {
                    report.acts += 1;
                    report.norms += ingest.norms;
                    report.rejected += ingest.rejected.len();
                }
                Err(_) => report.rejected += 1,
            }
        }
        report.rejected += clauses.iter().filter(|r| r.is_err()).count();

        tracing::info!(
            acts = report.acts,
            norms = report.norms,
            clauses = report.clauses,
            edges = report.edges,
            rejected = report.rejected,
            "Batch ingested"
        );
        report
    }

    /// Status of a norm at a date.
    ///
    /// # Errors
    ///
    /// Returns `VigenzaError::NormNotFound` for an unknown identifier.
    pub fn get_status(&self, id: &NormId, as_of: NaiveDate) -> Result<StatusReport> {
        let snapshot = self.builder.snapshot();
        StatusResolver::new(&snapshot, *self.config()).status(id, as_of)
    }

    /// Ingestion anomalies plus status anomalies of every norm at the end of
    /// the known history (the latest effective or enactment date in the
    /// graph).
    pub fn list_anomalies(&self) -> Vec<Anomaly> {
        let snapshot = self.builder.snapshot();
        let horizon = snapshot
            .edges()
            .map(|e| e.effective_date)
            .chain(snapshot.norms().filter_map(|n| n.enactment_date))
            .max();
        match horizon {
            Some(as_of) => self.sweep(&snapshot, as_of),
            None => self.anomalies.entries(),
        }
    }

    /// Ingestion anomalies plus status anomalies of every norm at `as_of`.
    pub fn list_anomalies_at(&self, as_of: NaiveDate) -> Vec<Anomaly> {
        let snapshot = self.builder.snapshot();
        self.sweep(&snapshot, as_of)
    }

    fn sweep(&self, snapshot: &GraphSnapshot, as_of: NaiveDate) -> Vec<Anomaly> {
        let resolver = StatusResolver::new(snapshot, *self.config());
        let ids: Vec<&NormId> = snapshot.norm_ids().collect();

        let mut derived: Vec<Anomaly> = ids
            .par_iter()
            .flat_map_iter(|id| match resolver.status(id, as_of) {
                Ok(report) => report.anomalies,
                Err(e) => vec![Anomaly::for_norm((*id).clone(), AnomalyReason::from(&e))],
            })
            .collect();
        derived.sort_by(|a, b| a.norm_id.cmp(&b.norm_id));
        derived.dedup();

        let mut out = self.anomalies.entries();
        for anomaly in derived {
            if !out.contains(&anomaly) {
                out.push(anomaly);
            }
        }
        tracing::debug!(as_of = %as_of, count = out.len(), "Listed anomalies");
        out
    }
}

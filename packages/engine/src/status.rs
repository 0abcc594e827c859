//! Status derivation
//!
//! Computes the legal status of a norm at a reference date from the
//! amendment edges in a graph snapshot. Nothing here mutates the graph.
//!
//! # Rules
//!
//! - The norm's lifeline starts at the earliest insertion that targets it or
//!   its nearest inserted ancestor; without insertions, at the enactment date
//!   of the nearest node that has one. Before that date the norm is
//!   `not_yet_in_force`.
//! - Edges on the norm itself and on its ancestors are applied in order of
//!   effective date, then batch sequence.
//! - A repeal makes the norm `repealed`. Repealing an article repeals every
//!   paragraph and letter it contains.
//! - A replacement makes the norm `superseded` and moves its active text to
//!   the replacing provision. A replacement or insertion reaching a repealed
//!   norm is flagged as a reinstatement; the status stays `repealed`.
//! - Amendments on contained provisions are reported but never change the
//!   status of the container: repealing paragraph 2 leaves its article in
//!   force.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

use crate::anomaly::{Anomaly, AnomalyReason};
use crate::config::EngineConfig;
use crate::error::{Result, VigenzaError};
use crate::graph::{AmendmentEdge, GraphSnapshot};
use crate::identifier::NormId;
use crate::types::{AmendmentKind, Confidence, Granularity, NormStatus};

/// Where a contributing edge sits relative to the queried norm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Own,
    Ancestor,
    Descendant,
}

impl Scope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Own => "own",
            Scope::Ancestor => "ancestor",
            Scope::Descendant => "descendant",
        }
    }
}

/// What a contributing edge did to the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Status became `repealed`
    Repealed,
    /// Status became `superseded`
    Superseded,
    /// Provision inserted; starts the lifeline
    Inserted,
    /// Content changed, status unchanged
    TextChanged,
    /// Applied to an already repealed norm; flagged
    Reinstatement,
    /// Kind unknown; confidence degraded
    Unclassified,
    /// Edge on a contained provision; reported only
    ReportedOnly,
}

impl Effect {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Repealed => "repealed",
            Effect::Superseded => "superseded",
            Effect::Inserted => "inserted",
            Effect::TextChanged => "text changed",
            Effect::Reinstatement => "reinstatement flagged",
            Effect::Unclassified => "unclassified",
            Effect::ReportedOnly => "reported only",
        }
    }
}

/// One amendment edge considered for a status, in application order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contribution {
    pub edge: AmendmentEdge,
    pub scope: Scope,
    pub effect: Effect,
}

/// Derived status of a norm at a date, with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub norm_id: NormId,
    pub as_of: NaiveDate,
    pub status: NormStatus,
    pub confidence: Confidence,
    /// First day the norm exists, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifeline_start: Option<NaiveDate>,
    /// Provision whose text is in force for this norm, when it is not the
    /// norm itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_text: Option<NormId>,
    pub contributing: Vec<Contribution>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<Anomaly>,
}

/// Derives [`StatusReport`]s from a snapshot.
pub struct StatusResolver<'a> {
    snapshot: &'a GraphSnapshot,
    config: EngineConfig,
}

impl<'a> StatusResolver<'a> {
    pub fn new(snapshot: &'a GraphSnapshot, config: EngineConfig) -> Self {
        Self { snapshot, config }
    }

    /// Status of `id` at `as_of`.
    ///
    /// # Errors
    ///
    /// Returns `VigenzaError::NormNotFound` if the norm is not in the graph.
    /// A cyclic replacement chain is not an error: the report carries status
    /// `unknown` and the cycle as an anomaly.
    pub fn status(&self, id: &NormId, as_of: NaiveDate) -> Result<StatusReport> {
        self.derive(id, as_of, true)
    }

    fn derive(&self, id: &NormId, as_of: NaiveDate, check_children: bool) -> Result<StatusReport> {
        if !self.snapshot.contains(id) {
            return Err(VigenzaError::NormNotFound(id.to_string()));
        }

        let mut lineage = vec![id.clone()];
        lineage.extend(id.ancestors());

        let mut report = StatusReport {
            norm_id: id.clone(),
            as_of,
            status: NormStatus::Unknown,
            confidence: Confidence::Full,
            lifeline_start: self.lifeline_start(&lineage),
            active_text: None,
            contributing: Vec::new(),
            anomalies: Vec::new(),
        };

        let mut governing: Vec<(&AmendmentEdge, Scope)> = lineage
            .iter()
            .flat_map(|node| {
                let scope = if node == id { Scope::Own } else { Scope::Ancestor };
                self.snapshot
                    .edges_targeting(node)
                    .filter(move |e| e.effective_date <= as_of)
                    .map(move |e| (e, scope))
            })
            .collect();
        governing.sort_by_key(|(e, _)| e.order_key());

        let mut status = match report.lifeline_start {
            Some(start) if start > as_of => NormStatus::NotYetInForce,
            Some(_) => NormStatus::InForce,
            None => NormStatus::Unknown,
        };
        let mut replaced_by: Option<&AmendmentEdge> = None;

        for (edge, scope) in governing {
            let effect = match edge.kind {
                AmendmentKind::Repeals => {
                    status = NormStatus::Repealed;
                    Effect::Repealed
                }
                AmendmentKind::Replaces | AmendmentKind::Inserts
                    if status == NormStatus::Repealed =>
                {
                    // Reported once, on the norm the edge targets
                    if scope == Scope::Own {
                        report.anomalies.push(Anomaly::for_norm(
                            id.clone(),
                            AnomalyReason::Reinstatement {
                                source: edge.source.to_string(),
                                effective_date: edge.effective_date.to_string(),
                            },
                        ));
                    }
                    Effect::Reinstatement
                }
                AmendmentKind::Replaces => {
                    if scope == Scope::Own {
                        replaced_by = Some(edge);
                    }
                    status = NormStatus::Superseded;
                    Effect::Superseded
                }
                AmendmentKind::Inserts => Effect::Inserted,
                AmendmentKind::Modifies => Effect::TextChanged,
                AmendmentKind::Unknown => {
                    report.confidence = Confidence::Degraded;
                    Effect::Unclassified
                }
            };
            report.contributing.push(Contribution {
                edge: edge.clone(),
                scope,
                effect,
            });
        }

        // A replacement on an ancestor supersedes the whole subtree but the
        // text pointer only follows replacements of the norm itself
        if let Some(edge) = replaced_by {
            match self.follow_replacements(id, &lineage, edge, as_of) {
                Ok(active) => report.active_text = Some(active),
                Err(VigenzaError::CyclicAmendmentChain { path }) => {
                    status = NormStatus::Unknown;
                    report.anomalies.push(Anomaly::for_norm(
                        id.clone(),
                        AnomalyReason::CyclicAmendmentChain { path },
                    ));
                }
                Err(e) => return Err(e),
            }
        }

        let mut descendant: Vec<Contribution> = self
            .snapshot
            .descendants(id)
            .iter()
            .flat_map(|node| self.snapshot.edges_targeting(node))
            .filter(|e| e.effective_date <= as_of)
            .map(|e| Contribution {
                edge: e.clone(),
                scope: Scope::Descendant,
                effect: Effect::ReportedOnly,
            })
            .collect();
        descendant.sort_by_key(|c| c.edge.order_key());
        report.contributing.extend(descendant);

        if check_children && status == NormStatus::InForce {
            if let Some(anomaly) = self.all_children_repealed(id, as_of)? {
                report.anomalies.push(anomaly);
            }
        }

        let unclassified_here = report
            .contributing
            .iter()
            .any(|c| c.scope == Scope::Own && c.effect == Effect::Unclassified);
        if unclassified_here {
            report
                .anomalies
                .push(Anomaly::for_norm(id.clone(), AnomalyReason::DegradedConfidence));
        }

        report.status = status;
        tracing::debug!(
            norm_id = %id,
            as_of = %as_of,
            status = status.as_str(),
            contributing = report.contributing.len(),
            "Derived status"
        );
        Ok(report)
    }

    fn lifeline_start(&self, lineage: &[NormId]) -> Option<NaiveDate> {
        // An insertion only starts the lifeline of a provision no earlier
        // amendment has touched; re-inserting a repealed article does not
        // erase its first life
        let inserted = lineage.iter().find_map(|node| {
            let first_insert = self
                .snapshot
                .edges_targeting(node)
                .filter(|e| e.kind == AmendmentKind::Inserts)
                .map(|e| e.effective_date)
                .min()?;
            let touched_before = self
                .snapshot
                .edges_targeting(node)
                .any(|e| e.kind != AmendmentKind::Inserts && e.effective_date < first_insert);
            (!touched_before).then_some(first_insert)
        });
        inserted.or_else(|| {
            lineage
                .iter()
                .find_map(|node| self.snapshot.norm(node).and_then(|n| n.enactment_date))
        })
    }

    /// Follow the replacement chain from `first` to the provision whose text
    /// is in force.
    fn follow_replacements(
        &self,
        id: &NormId,
        lineage: &[NormId],
        first: &AmendmentEdge,
        as_of: NaiveDate,
    ) -> Result<NormId> {
        let mut seen: HashSet<&NormId> = lineage.iter().collect();
        let mut path = vec![id.to_string()];
        let mut current = &first.source;

        for _ in 0..self.config.max_chain_depth {
            path.push(current.to_string());
            // A replacement drafted inside the provision it replaces is
            // self-referential
            if seen.contains(current) || id.is_ancestor_of(current) {
                return Err(VigenzaError::CyclicAmendmentChain { path });
            }
            seen.insert(current);

            let next = self
                .snapshot
                .edges_targeting(current)
                .filter(|e| e.kind == AmendmentKind::Replaces && e.effective_date <= as_of)
                .max_by_key(|e| e.order_key());
            match next {
                Some(edge) => current = &edge.source,
                None => return Ok(current.clone()),
            }
        }

        path.push("...".to_string());
        Err(VigenzaError::CyclicAmendmentChain { path })
    }

    fn all_children_repealed(&self, id: &NormId, as_of: NaiveDate) -> Result<Option<Anomaly>> {
        if id.granularity() == Granularity::Act {
            return Ok(None);
        }
        let children: Vec<&NormId> = self.snapshot.children(id).collect();
        if children.is_empty() {
            return Ok(None);
        }
        for child in &children {
            if self.derive(child, as_of, false)?.status != NormStatus::Repealed {
                return Ok(None);
            }
        }
        Ok(Some(Anomaly::for_norm(
            id.clone(),
            AnomalyReason::AllChildrenRepealed {
                children: children.len(),
            },
        )))
    }
}

impl StatusReport {
    /// Human-readable derivation tree.
    ///
    /// ```text
    /// urn:nir:stato:legge:1991;14~art2bis @ 2021-06-01: in_force (full)
    /// +-- lifeline starts 2020-07-14
    /// +-- 2020-07-14 inserts [own] from urn:nir:stato:legge:2020;77~art1 -> inserted
    /// `-- 2021-01-01 repeals [descendant ~art2bis-com2] from ... -> reported only
    /// ```
    #[must_use]
    pub fn explain(&self) -> String {
        let mut lines = vec![format!(
            "{} @ {}: {} ({})",
            self.norm_id,
            self.as_of,
            self.status.as_str(),
            self.confidence.as_str()
        )];

        let mut children = Vec::new();
        match self.lifeline_start {
            Some(start) => children.push(format!("lifeline starts {start}")),
            None => children.push("lifeline start unknown".to_string()),
        }
        for c in &self.contributing {
            let scope = match c.scope {
                Scope::Own => c.scope.as_str().to_string(),
                _ => format!("{} {}", c.scope.as_str(), short_path(&c.edge.target)),
            };
            children.push(format!(
                "{} {} [{}] from {} -> {}",
                c.edge.effective_date,
                c.edge.kind.as_str(),
                scope,
                c.edge.source,
                c.effect.as_str()
            ));
        }
        if let Some(active) = &self.active_text {
            children.push(format!("active text: {active}"));
        }
        for anomaly in &self.anomalies {
            children.push(format!("anomaly {anomaly}"));
        }

        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            let prefix = if i + 1 == count { "`-- " } else { "+-- " };
            lines.push(format!("{prefix}{child}"));
        }
        lines.join("\n")
    }
}

/// The part of an identifier after the act, e.g. `~art2-com3`.
fn short_path(id: &NormId) -> String {
    let full = id.to_string();
    match full.find('~') {
        Some(i) => full[i..].to_string(),
        None => full,
    }
}

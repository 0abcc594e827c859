//! Anomaly records
//!
//! Anything the engine could not process cleanly is recorded here instead of
//! aborting: unparseable or ambiguous clauses at ingestion time, and data
//! inconsistencies found while deriving status.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;

use crate::error::VigenzaError;
use crate::identifier::NormId;

/// Why a record was flagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyReason {
    /// Clause destination could not be parsed
    ParseFailure { text: String, reason: String },
    /// Destination matched more than one act
    AmbiguousReference {
        reference: String,
        candidates: Vec<String>,
    },
    /// Destination could not be bound to any act
    UnresolvedReference { detail: String },
    /// Clause verb not recognized; edge recorded with kind `unknown`
    UnclassifiedAmendment { text: String },
    /// Replacement chain revisits a node
    CyclicAmendmentChain { path: Vec<String> },
    /// An insertion or replacement applied to a repealed provision
    Reinstatement { source: String, effective_date: String },
    /// Status derived from at least one unclassified amendment
    DegradedConfidence,
    /// Article still in force while every paragraph is repealed
    AllChildrenRepealed { children: usize },
    /// Upsert retry budget exhausted
    StoreConflict { detail: String },
    /// Act or provision identifier could not be parsed
    InvalidIdentifier { detail: String },
}

impl AnomalyReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyReason::ParseFailure { .. } => "parse_failure",
            AnomalyReason::AmbiguousReference { .. } => "ambiguous_reference",
            AnomalyReason::UnresolvedReference { .. } => "unresolved_reference",
            AnomalyReason::UnclassifiedAmendment { .. } => "unclassified_amendment",
            AnomalyReason::CyclicAmendmentChain { .. } => "cyclic_amendment_chain",
            AnomalyReason::Reinstatement { .. } => "reinstatement",
            AnomalyReason::DegradedConfidence => "degraded_confidence",
            AnomalyReason::AllChildrenRepealed { .. } => "all_children_repealed",
            AnomalyReason::StoreConflict { .. } => "store_conflict",
            AnomalyReason::InvalidIdentifier { .. } => "invalid_identifier",
        }
    }
}

/// A flagged record: a norm, or a clause that never became one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    /// Affected norm, when the anomaly could be bound to one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub norm_id: Option<NormId>,
    /// Batch position of the clause that raised it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub reason: AnomalyReason,
}

impl Anomaly {
    #[must_use]
    pub fn for_norm(norm_id: NormId, reason: AnomalyReason) -> Self {
        Self {
            norm_id: Some(norm_id),
            sequence: None,
            reason,
        }
    }

    /// Anomaly raised while processing clause `sequence`.
    #[must_use]
    pub fn for_clause(sequence: u64, reason: AnomalyReason) -> Self {
        Self {
            norm_id: None,
            sequence: Some(sequence),
            reason,
        }
    }

    #[must_use]
    pub fn with_norm(mut self, norm_id: NormId) -> Self {
        self.norm_id = Some(norm_id);
        self
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.reason.as_str())?;
        if let Some(id) = &self.norm_id {
            write!(f, " {id}")?;
        }
        if let Some(seq) = self.sequence {
            write!(f, " (clause #{seq})")?;
        }
        match &self.reason {
            AnomalyReason::ParseFailure { text, reason } => write!(f, ": {reason}: {text}"),
            AnomalyReason::AmbiguousReference {
                reference,
                candidates,
            } => write!(f, ": {reference} matches {}", candidates.join(", ")),
            AnomalyReason::UnresolvedReference { detail }
            | AnomalyReason::StoreConflict { detail }
            | AnomalyReason::InvalidIdentifier { detail } => write!(f, ": {detail}"),
            AnomalyReason::UnclassifiedAmendment { text } => write!(f, ": {text}"),
            AnomalyReason::CyclicAmendmentChain { path } => write!(f, ": {}", path.join(" -> ")),
            AnomalyReason::Reinstatement {
                source,
                effective_date,
            } => write!(f, ": by {source} on {effective_date}"),
            AnomalyReason::DegradedConfidence => Ok(()),
            AnomalyReason::AllChildrenRepealed { children } => {
                write!(f, ": all {children} children repealed")
            }
        }
    }
}

impl From<&VigenzaError> for AnomalyReason {
    fn from(err: &VigenzaError) -> Self {
        match err {
            VigenzaError::ParseFailure { text, reason } => AnomalyReason::ParseFailure {
                text: text.clone(),
                reason: reason.clone(),
            },
            VigenzaError::AmbiguousReference {
                reference,
                candidates,
            } => AnomalyReason::AmbiguousReference {
                reference: reference.clone(),
                candidates: candidates.clone(),
            },
            VigenzaError::UnclassifiedAmendment(text) => AnomalyReason::UnclassifiedAmendment {
                text: text.clone(),
            },
            VigenzaError::CyclicAmendmentChain { path } => {
                AnomalyReason::CyclicAmendmentChain { path: path.clone() }
            }
            VigenzaError::StoreConflict { .. } => AnomalyReason::StoreConflict {
                detail: err.to_string(),
            },
            VigenzaError::InvalidIdentifier(detail) | VigenzaError::InvalidDate(detail) => {
                AnomalyReason::InvalidIdentifier {
                    detail: detail.clone(),
                }
            }
            other => AnomalyReason::UnresolvedReference {
                detail: other.to_string(),
            },
        }
    }
}

/// Append-only log of ingestion anomalies, shared across worker threads.
#[derive(Debug, Default)]
pub struct AnomalyLog {
    entries: Mutex<Vec<Anomaly>>,
}

impl AnomalyLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an anomaly; an identical entry is kept once.
    pub fn record(&self, anomaly: Anomaly) {
        tracing::warn!(anomaly = %anomaly, "Anomaly recorded");
        let mut entries = self.entries.lock();
        if !entries.contains(&anomaly) {
            entries.push(anomaly);
        }
    }

    /// Entries ordered by clause position, then norm.
    #[must_use]
    pub fn entries(&self) -> Vec<Anomaly> {
        let mut out = self.entries.lock().clone();
        out.sort_by(|a, b| {
            a.sequence
                .cmp(&b.sequence)
                .then_with(|| a.norm_id.cmp(&b.norm_id))
                .then_with(|| a.reason.as_str().cmp(b.reason.as_str()))
        });
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

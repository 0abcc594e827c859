//! Norm graph store and builder
//!
//! The graph holds norm nodes, containment edges (act > article > paragraph >
//! letter) and amendment edges. Status is never stored; it is derived from
//! the edges by [`crate::status`].
//!
//! # Concurrency
//!
//! [`MemoryStore`] keeps the whole graph behind a `parking_lot::RwLock` holding
//! an `Arc<GraphSnapshot>`. Readers clone the `Arc` and work on an immutable
//! snapshot while writers copy-on-write, so a status query never observes a
//! half-applied ingestion. Node writes are guarded by a per-node version:
//! [`GraphBuilder::upsert_norm`] reads a snapshot, merges, and commits with the
//! version it read, retrying when another writer got there first.

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{Result, VigenzaError};
use crate::identifier::{ActId, ItemLetter, NormId, ProvisionNumber};
use crate::types::{AmendmentKind, Granularity, Norm, RawAct};

/// Directed amendment edge from an amending provision to its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmendmentEdge {
    pub source: NormId,
    pub target: NormId,
    pub kind: AmendmentKind,
    /// Level at which the amendment was scoped
    pub granularity: Granularity,
    pub effective_date: NaiveDate,
    /// Clause text, kept for audit
    pub raw_text: String,
    /// Position of the clause in its batch; orders same-day amendments
    pub sequence: u64,
}

type EdgeKey = (NormId, NormId, AmendmentKind, NaiveDate);

impl AmendmentEdge {
    fn key(&self) -> EdgeKey {
        (
            self.source.clone(),
            self.target.clone(),
            self.kind,
            self.effective_date,
        )
    }

    /// Application order: effective date, then batch sequence.
    #[must_use]
    pub fn order_key(&self) -> (NaiveDate, u64) {
        (self.effective_date, self.sequence)
    }
}

/// Classified amendment not yet bound to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amendment {
    pub kind: AmendmentKind,
    pub effective_date: NaiveDate,
    pub raw_text: String,
    pub sequence: u64,
}

#[derive(Debug, Clone)]
struct NodeRecord {
    norm: Norm,
    version: u64,
}

/// Immutable view of the graph at one point in time.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    nodes: BTreeMap<NormId, NodeRecord>,
    children: BTreeMap<NormId, BTreeSet<NormId>>,
    edges: Vec<AmendmentEdge>,
    edge_keys: HashMap<EdgeKey, usize>,
    incoming: HashMap<NormId, Vec<usize>>,
}

impl GraphSnapshot {
    #[must_use]
    pub fn norm(&self, id: &NormId) -> Option<&Norm> {
        self.nodes.get(id).map(|r| &r.norm)
    }

    /// Current version of a node; `None` if absent.
    #[must_use]
    pub fn version(&self, id: &NormId) -> Option<u64> {
        self.nodes.get(id).map(|r| r.version)
    }

    #[must_use]
    pub fn contains(&self, id: &NormId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn norms(&self) -> impl Iterator<Item = &Norm> {
        self.nodes.values().map(|r| &r.norm)
    }

    pub fn norm_ids(&self) -> impl Iterator<Item = &NormId> {
        self.nodes.keys()
    }

    /// Every act node in the graph.
    pub fn acts(&self) -> impl Iterator<Item = &ActId> {
        self.nodes
            .keys()
            .filter(|id| id.granularity() == Granularity::Act)
            .map(NormId::act_id)
    }

    /// Direct children through containment edges.
    pub fn children(&self, id: &NormId) -> impl Iterator<Item = &NormId> {
        self.children.get(id).into_iter().flatten()
    }

    /// All nodes contained in `id`, at any depth.
    #[must_use]
    pub fn descendants(&self, id: &NormId) -> Vec<NormId> {
        let mut out = Vec::new();
        let mut stack: Vec<&NormId> = self.children(id).collect();
        while let Some(child) = stack.pop() {
            out.push(child.clone());
            stack.extend(self.children(child));
        }
        out.sort();
        out
    }

    /// Amendment edges whose target is exactly `id`.
    pub fn edges_targeting(&self, id: &NormId) -> impl Iterator<Item = &AmendmentEdge> {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.edges.get(i))
    }

    pub fn edges(&self) -> impl Iterator<Item = &AmendmentEdge> {
        self.edges.iter()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn containment_count(&self) -> usize {
        self.children.values().map(BTreeSet::len).sum()
    }
}

/// Storage backend for the norm graph.
///
/// Implementations must make every method atomic with respect to readers: a
/// snapshot taken before a call sees none of its effects, one taken after
/// sees all of them.
pub trait NormStore: Send + Sync {
    /// Current immutable view of the graph.
    fn snapshot(&self) -> Arc<GraphSnapshot>;

    /// Write a node if its version still equals `expected` (`None` = absent).
    ///
    /// Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns `VigenzaError::StoreConflict` when the version moved.
    fn commit_norm(&self, norm: Norm, expected: Option<u64>) -> Result<u64>;

    /// Add a containment edge; returns `false` if it already existed.
    fn add_containment(&self, parent: &NormId, child: &NormId) -> Result<bool>;

    /// Add an amendment edge; returns `false` for a duplicate of
    /// (source, target, kind, effective date). A duplicate with a lower
    /// sequence lowers the stored edge's sequence.
    fn add_amendment(&self, edge: AmendmentEdge) -> Result<bool>;
}

/// In-memory [`NormStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Arc<GraphSnapshot>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NormStore for MemoryStore {
    fn snapshot(&self) -> Arc<GraphSnapshot> {
        Arc::clone(&self.state.read())
    }

    fn commit_norm(&self, norm: Norm, expected: Option<u64>) -> Result<u64> {
        let mut guard = self.state.write();
        let found = guard.version(&norm.id);
        if found != expected {
            return Err(VigenzaError::StoreConflict {
                norm_id: norm.id.to_string(),
                expected,
                found,
            });
        }

        let version = found.unwrap_or(0) + 1;
        let state = Arc::make_mut(&mut guard);
        state
            .nodes
            .insert(norm.id.clone(), NodeRecord { norm, version });
        Ok(version)
    }

    fn add_containment(&self, parent: &NormId, child: &NormId) -> Result<bool> {
        let mut guard = self.state.write();
        if guard
            .children
            .get(parent)
            .is_some_and(|set| set.contains(child))
        {
            return Ok(false);
        }
        let state = Arc::make_mut(&mut guard);
        state
            .children
            .entry(parent.clone())
            .or_default()
            .insert(child.clone());
        Ok(true)
    }

    fn add_amendment(&self, edge: AmendmentEdge) -> Result<bool> {
        let mut guard = self.state.write();
        let key = edge.key();
        if let Some(&index) = guard.edge_keys.get(&key) {
            // Duplicates keep the earliest batch position, whichever thread
            // attached first
            if guard.edges[index].sequence > edge.sequence {
                Arc::make_mut(&mut guard).edges[index].sequence = edge.sequence;
            }
            return Ok(false);
        }
        let state = Arc::make_mut(&mut guard);
        let index = state.edges.len();
        state
            .incoming
            .entry(edge.target.clone())
            .or_default()
            .push(index);
        state.edge_keys.insert(key, index);
        state.edges.push(edge);
        Ok(true)
    }
}

/// Outcome of ingesting one raw act.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActIngest {
    pub act: Option<NormId>,
    /// Nodes written (act, articles, paragraphs, letters)
    pub norms: usize,
    /// Sub-provisions skipped because their number could not be parsed
    pub rejected: Vec<String>,
}

/// Builds the graph on top of a [`NormStore`].
pub struct GraphBuilder<S: NormStore> {
    store: S,
    config: EngineConfig,
}

impl<S: NormStore> GraphBuilder<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.store.snapshot()
    }

    /// Create or merge a norm, creating stub ancestors and containment edges
    /// as needed.
    ///
    /// Merging is field-wise: incoming values only fill fields the stored
    /// record lacks, so repeating an upsert changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `VigenzaError::StoreConflict` once the retry budget is spent.
    pub fn upsert_norm(&self, norm: Norm) -> Result<NormId> {
        let id = norm.id.clone();
        self.ensure_lineage(&id)?;
        self.upsert_single(norm)?;
        if let Some(parent) = id.parent() {
            self.store.add_containment(&parent, &id)?;
        }
        Ok(id)
    }

    fn upsert_single(&self, norm: Norm) -> Result<()> {
        let mut last_conflict = None;

        for attempt in 1..=self.config.max_upsert_retries {
            let snapshot = self.store.snapshot();
            let (merged, expected) = match snapshot.nodes.get(&norm.id) {
                Some(record) => (record.norm.merge(&norm), Some(record.version)),
                None => (norm.clone(), None),
            };

            if expected.is_some() && snapshot.norm(&norm.id) == Some(&merged) {
                return Ok(());
            }

            match self.store.commit_norm(merged, expected) {
                Ok(version) => {
                    tracing::trace!(norm_id = %norm.id, version, "Committed norm");
                    return Ok(());
                }
                Err(conflict @ VigenzaError::StoreConflict { .. }) => {
                    tracing::debug!(norm_id = %norm.id, attempt, "Upsert conflict, retrying");
                    last_conflict = Some(conflict);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_conflict.unwrap_or_else(|| VigenzaError::StoreConflict {
            norm_id: norm.id.to_string(),
            expected: None,
            found: None,
        }))
    }

    /// Make sure every ancestor of `id` exists, linked top-down.
    fn ensure_lineage(&self, id: &NormId) -> Result<()> {
        let mut lineage = id.ancestors();
        lineage.reverse();

        let snapshot = self.store.snapshot();
        for (i, ancestor) in lineage.iter().enumerate() {
            if !snapshot.contains(ancestor) {
                tracing::debug!(norm_id = %ancestor, "Creating stub ancestor");
                self.upsert_single(Norm::stub(ancestor.clone()))?;
            }
            if i > 0 {
                self.store.add_containment(&lineage[i - 1], ancestor)?;
            }
        }
        Ok(())
    }

    /// Ingest a raw act: the act node, then its articles, paragraphs and
    /// lettered items with containment edges.
    ///
    /// Only the act carries the enactment date; contained provisions inherit
    /// it unless an insertion gives them a later start.
    ///
    /// # Errors
    ///
    /// Returns `VigenzaError::InvalidIdentifier` if the act id is malformed.
    /// Malformed sub-provision numbers are collected in
    /// [`ActIngest::rejected`] without stopping the act.
    pub fn ingest_act(&self, raw: &RawAct) -> Result<ActIngest> {
        let act_id: ActId = raw.id.parse()?;
        let act_norm_id = NormId::act(act_id.clone());

        let mut act_norm = Norm::new(act_norm_id.clone()).with_enactment_date(raw.enactment_date);
        if let Some(title) = &raw.title {
            act_norm = act_norm.with_title(title.clone());
        }
        self.upsert_norm(act_norm)?;

        let mut report = ActIngest {
            act: Some(act_norm_id),
            norms: 1,
            rejected: Vec::new(),
        };

        for article in &raw.articles {
            let number_text = match &article.suffix {
                Some(suffix) => format!("{}-{}", article.number, suffix),
                None => article.number.clone(),
            };
            let number: ProvisionNumber = match number_text.parse() {
                Ok(n) => n,
                Err(e) => {
                    report.rejected.push(e.to_string());
                    continue;
                }
            };
            let article_id = NormId::article_of(act_id.clone(), number);
            let mut article_norm = Norm::new(article_id.clone());
            if let Some(text) = &article.text {
                article_norm = article_norm.with_text(text.clone());
            }
            self.upsert_norm(article_norm)?;
            report.norms += 1;

            for paragraph in &article.paragraphs {
                let number: ProvisionNumber = match paragraph.number.parse() {
                    Ok(n) => n,
                    Err(e) => {
                        report.rejected.push(e.to_string());
                        continue;
                    }
                };
                let paragraph_id = article_id.clone().with_paragraph(number);
                self.upsert_norm(Norm::new(paragraph_id.clone()).with_text(paragraph.text.clone()))?;
                report.norms += 1;

                for letter in &paragraph.letters {
                    let item: ItemLetter = match letter.letter.parse() {
                        Ok(l) => l,
                        Err(e) => {
                            report.rejected.push(e.to_string());
                            continue;
                        }
                    };
                    let letter_id = paragraph_id.clone().with_letter(item);
                    self.upsert_norm(Norm::new(letter_id).with_text(letter.text.clone()))?;
                    report.norms += 1;
                }
            }
        }

        tracing::debug!(
            act_id = %act_id,
            norms = report.norms,
            rejected = report.rejected.len(),
            "Ingested act"
        );
        Ok(report)
    }

    /// Record an amendment edge from `source` to an already resolved target.
    ///
    /// The source and the target are created as stubs when missing. Returns
    /// the edge and whether it was new.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn attach_resolved(
        &self,
        source: &NormId,
        target: &NormId,
        amendment: &Amendment,
    ) -> Result<(AmendmentEdge, bool)> {
        self.upsert_norm(Norm::stub(source.clone()))?;
        self.upsert_norm(Norm::stub(target.clone()))?;

        let edge = AmendmentEdge {
            source: source.clone(),
            target: target.clone(),
            kind: amendment.kind,
            granularity: target.granularity(),
            effective_date: amendment.effective_date,
            raw_text: amendment.raw_text.clone(),
            sequence: amendment.sequence,
        };
        let added = self.store.add_amendment(edge.clone())?;
        if added {
            tracing::debug!(
                source = %edge.source,
                target = %edge.target,
                kind = edge.kind.as_str(),
                effective_date = %edge.effective_date,
                "Attached amendment"
            );
        }
        Ok((edge, added))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActType, RawArticle, RawLetter, RawParagraph};

    fn act() -> ActId {
        ActId::new(ActType::Legge, 1991, "14")
    }

    fn builder() -> GraphBuilder<MemoryStore> {
        GraphBuilder::new(MemoryStore::new(), EngineConfig::default())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw_act() -> RawAct {
        RawAct {
            id: "legge:1991;14".to_string(),
            title: Some("Legge di prova".to_string()),
            enactment_date: date(1991, 2, 10),
            articles: vec![RawArticle {
                number: "2".to_string(),
                suffix: None,
                text: None,
                paragraphs: vec![RawParagraph {
                    number: "1".to_string(),
                    text: "Testo del comma 1.".to_string(),
                    letters: vec![RawLetter {
                        letter: "a".to_string(),
                        text: "prima lettera".to_string(),
                    }],
                }],
            }],
        }
    }

    #[test]
    fn test_ingest_act_builds_containment() {
        let b = builder();
        let report = b.ingest_act(&raw_act()).unwrap();
        assert_eq!(report.norms, 4);
        assert!(report.rejected.is_empty());

        let snap = b.snapshot();
        let article = NormId::article_of(act(), ProvisionNumber::new(2));
        let paragraph = article.clone().with_paragraph(ProvisionNumber::new(1));
        assert!(snap.contains(&paragraph));
        assert_eq!(snap.children(&article).collect::<Vec<_>>(), vec![&paragraph]);
        assert_eq!(snap.descendants(&NormId::act(act())).len(), 3);
        assert_eq!(snap.containment_count(), 3);
        assert_eq!(
            snap.norm(&NormId::act(act())).unwrap().enactment_date,
            Some(date(1991, 2, 10))
        );
    }

    #[test]
    fn test_ingest_twice_is_idempotent() {
        let b = builder();
        b.ingest_act(&raw_act()).unwrap();
        let first = b.snapshot();
        b.ingest_act(&raw_act()).unwrap();
        let second = b.snapshot();

        assert_eq!(first.node_count(), second.node_count());
        assert_eq!(first.containment_count(), second.containment_count());
        for id in first.norm_ids() {
            assert_eq!(first.version(id), second.version(id), "{id}");
        }
    }

    #[test]
    fn test_rejected_numbers_do_not_stop_the_act() {
        let mut raw = raw_act();
        raw.articles.push(RawArticle {
            number: "ter".to_string(),
            suffix: None,
            text: None,
            paragraphs: vec![],
        });
        let report = builder().ingest_act(&raw).unwrap();
        assert_eq!(report.norms, 4);
        assert_eq!(report.rejected.len(), 1);
    }

    #[test]
    fn test_upsert_creates_stub_lineage() {
        let b = builder();
        let letter = NormId::article_of(act(), ProvisionNumber::new(3))
            .with_paragraph(ProvisionNumber::new(2))
            .with_letter("b".parse().unwrap());
        b.upsert_norm(Norm::stub(letter.clone())).unwrap();

        let snap = b.snapshot();
        assert_eq!(snap.node_count(), 4);
        for ancestor in letter.ancestors() {
            assert!(snap.norm(&ancestor).unwrap().is_stub, "{ancestor}");
        }
        assert_eq!(snap.containment_count(), 3);
    }

    #[test]
    fn test_stub_then_fill_keeps_identity() {
        let b = builder();
        let id = NormId::article_of(act(), ProvisionNumber::new(3));
        b.upsert_norm(Norm::stub(id.clone())).unwrap();
        b.upsert_norm(Norm::new(id.clone()).with_text("Art. 3 text")).unwrap();

        let snap = b.snapshot();
        let norm = snap.norm(&id).unwrap();
        assert!(!norm.is_stub);
        assert_eq!(norm.text.as_deref(), Some("Art. 3 text"));
        assert_eq!(snap.version(&id), Some(2));

        // A late stub upsert must not downgrade the filled node
        b.upsert_norm(Norm::stub(id.clone())).unwrap();
        assert!(!b.snapshot().norm(&id).unwrap().is_stub);
    }

    #[test]
    fn test_commit_with_stale_version_conflicts() {
        let store = MemoryStore::new();
        let id = NormId::act(act());
        store.commit_norm(Norm::new(id.clone()), None).unwrap();
        let err = store.commit_norm(Norm::new(id), None).unwrap_err();
        assert!(matches!(
            err,
            VigenzaError::StoreConflict {
                expected: None,
                found: Some(1),
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_amendment_is_ignored() {
        let b = builder();
        let source = NormId::article_of(ActId::new(ActType::Legge, 2020, "77"), ProvisionNumber::new(1));
        let target = NormId::article_of(act(), ProvisionNumber::new(4));
        let amendment = Amendment {
            kind: AmendmentKind::Repeals,
            effective_date: date(2021, 1, 1),
            raw_text: "l'articolo 4 è abrogato".to_string(),
            sequence: 0,
        };
        let (_, first) = b.attach_resolved(&source, &target, &amendment).unwrap();
        let (_, second) = b
            .attach_resolved(&source, &target, &Amendment { sequence: 5, ..amendment })
            .unwrap();
        assert!(first);
        assert!(!second);
        assert_eq!(b.snapshot().edge_count(), 1);
        assert_eq!(b.snapshot().edges().next().unwrap().sequence, 0);
        assert_eq!(b.snapshot().edges_targeting(&target).count(), 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let b = builder();
        let before = b.snapshot();
        b.ingest_act(&raw_act()).unwrap();
        assert_eq!(before.node_count(), 0);
        assert_eq!(b.snapshot().node_count(), 4);
    }

    #[test]
    fn test_parallel_upserts_converge() {
        use rayon::prelude::*;

        let b = builder();
        let id = NormId::article_of(act(), ProvisionNumber::new(9));
        (0..64).into_par_iter().for_each(|i| {
            let norm = if i % 2 == 0 {
                Norm::stub(id.clone())
            } else {
                Norm::new(id.clone()).with_text("Testo")
            };
            b.upsert_norm(norm).unwrap();
        });

        let snap = b.snapshot();
        let norm = snap.norm(&id).unwrap();
        assert!(!norm.is_stub);
        assert_eq!(norm.text.as_deref(), Some("Testo"));
        assert_eq!(snap.node_count(), 3);
    }
}

//! Norm resolver
//!
//! Binds a parsed [`DestinationRef`] to exactly one [`NormId`]. Matching is
//! structural: the act by (type, year, number), then the article, paragraph
//! and letter by exact identity. "Art. 1" never matches "Art. 14" and
//! "Art. 2" never matches "Art. 2-bis".
//!
//! The act is chosen in this order:
//! 1. the act cited in the clause text;
//! 2. the act supplied by the caller as context;
//! 3. the single act in the graph that has the cited article.
//!
//! A destination whose act is known but whose provision is not yet in the
//! graph resolves to [`Resolution::Stub`]; the caller creates the stub.

use crate::error::{Result, VigenzaError};
use crate::graph::GraphSnapshot;
use crate::identifier::{ActId, NormId};
use crate::parser::DestinationRef;

/// Outcome of binding a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The target node already exists
    Existing(NormId),
    /// The target must be created as a stub
    Stub(NormId),
}

impl Resolution {
    #[must_use]
    pub fn norm_id(&self) -> &NormId {
        match self {
            Resolution::Existing(id) | Resolution::Stub(id) => id,
        }
    }

    #[must_use]
    pub fn into_norm_id(self) -> NormId {
        match self {
            Resolution::Existing(id) | Resolution::Stub(id) => id,
        }
    }

    #[must_use]
    pub fn is_stub(&self) -> bool {
        matches!(self, Resolution::Stub(_))
    }
}

fn ambiguous(destination: &DestinationRef, candidates: &[ActId]) -> VigenzaError {
    VigenzaError::AmbiguousReference {
        reference: destination.to_string(),
        candidates: candidates
            .iter()
            .map(|a| NormId::act(a.clone()).to_string())
            .collect(),
    }
}

fn bind_act(
    snapshot: &GraphSnapshot,
    destination: &DestinationRef,
    context: Option<&ActId>,
) -> Result<ActId> {
    if let Some(cited) = &destination.act {
        let candidates: Vec<ActId> = snapshot.acts().filter(|a| cited.matches(a)).cloned().collect();
        return match candidates.as_slice() {
            [single] => Ok(single.clone()),
            [] => cited
                .to_act_id()
                .or_else(|| context.filter(|c| cited.matches(c)).cloned())
                .ok_or_else(|| {
                    VigenzaError::UnresolvedReference(format!(
                        "{destination}: act '{cited}' is not in the graph and the citation is incomplete"
                    ))
                }),
            _ => Err(ambiguous(destination, &candidates)),
        };
    }

    if let Some(context) = context {
        return Ok(context.clone());
    }

    let candidates: Vec<ActId> = snapshot
        .acts()
        .filter(|a| snapshot.contains(&NormId::article_of((*a).clone(), destination.article)))
        .cloned()
        .collect();
    match candidates.as_slice() {
        [single] => Ok(single.clone()),
        [] => Err(VigenzaError::UnresolvedReference(format!(
            "{destination}: no act cited and no act in the graph has article {}",
            destination.article
        ))),
        _ => Err(ambiguous(destination, &candidates)),
    }
}

/// Bind a destination to a norm identifier.
///
/// `context` is the act being amended when the clause itself does not cite
/// one (typically the act named in the introductory sentence of the
/// amending article).
///
/// # Errors
///
/// - `VigenzaError::AmbiguousReference` if more than one act could be meant
/// - `VigenzaError::UnresolvedReference` if no act can be determined
pub fn resolve(
    snapshot: &GraphSnapshot,
    destination: &DestinationRef,
    context: Option<&ActId>,
) -> Result<Resolution> {
    let act = bind_act(snapshot, destination, context)?;

    let mut id = NormId::article_of(act, destination.article);
    if let Some(paragraph) = destination.paragraph {
        id = id.with_paragraph(paragraph);
    }
    if let Some(letter) = &destination.letter {
        id = id.with_letter(letter.clone());
    }

    let resolution = if snapshot.contains(&id) {
        Resolution::Existing(id)
    } else {
        Resolution::Stub(id)
    };
    tracing::debug!(
        destination = %destination,
        norm_id = %resolution.norm_id(),
        stub = resolution.is_stub(),
        "Resolved destination"
    );
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::graph::{GraphBuilder, MemoryStore};
    use crate::identifier::ProvisionNumber;
    use crate::parser::parse_destination;
    use crate::types::{ActType, RawAct, RawArticle, RawParagraph};
    use chrono::NaiveDate;

    fn raw_act(id: &str, articles: &[&str]) -> RawAct {
        RawAct {
            id: id.to_string(),
            title: None,
            enactment_date: NaiveDate::from_ymd_opt(1991, 2, 10).unwrap(),
            articles: articles
                .iter()
                .map(|n| RawArticle {
                    number: (*n).to_string(),
                    suffix: None,
                    text: None,
                    paragraphs: vec![RawParagraph {
                        number: "1".to_string(),
                        text: format!("Art. {n}, comma 1."),
                        letters: vec![],
                    }],
                })
                .collect(),
        }
    }

    fn graph(acts: &[RawAct]) -> GraphBuilder<MemoryStore> {
        let b = GraphBuilder::new(MemoryStore::new(), EngineConfig::default());
        for act in acts {
            b.ingest_act(act).unwrap();
        }
        b
    }

    fn legge_14() -> ActId {
        ActId::new(ActType::Legge, 1991, "14")
    }

    #[test]
    fn test_article_1_and_14_stay_distinct() {
        let b = graph(&[raw_act("legge:1991;14", &["1", "14"])]);
        let snap = b.snapshot();
        let dest = parse_destination("l'articolo 14 è abrogato").unwrap();
        let resolved = resolve(&snap, &dest, Some(&legge_14())).unwrap();
        assert_eq!(
            resolved,
            Resolution::Existing(NormId::article_of(legge_14(), ProvisionNumber::new(14)))
        );
    }

    #[test]
    fn test_suffix_never_falls_back_to_base_article() {
        let b = graph(&[raw_act("legge:1991;14", &["2"])]);
        let snap = b.snapshot();
        let dest = parse_destination("il comma 2 dell'articolo 2-bis è abrogato").unwrap();
        let resolved = resolve(&snap, &dest, Some(&legge_14())).unwrap();
        assert!(resolved.is_stub());
        assert_eq!(
            resolved.norm_id().to_string(),
            "urn:nir:stato:legge:1991;14~art2bis-com2"
        );
    }

    #[test]
    fn test_cited_act_wins_over_context() {
        let b = graph(&[
            raw_act("legge:1991;14", &["3"]),
            raw_act("decreto.legislativo:2001;165", &["3"]),
        ]);
        let snap = b.snapshot();
        let dest =
            parse_destination("l'articolo 3 del decreto legislativo 30 marzo 2001, n. 165 è abrogato")
                .unwrap();
        let resolved = resolve(&snap, &dest, Some(&legge_14())).unwrap();
        assert_eq!(
            resolved.norm_id().act_id(),
            &ActId::new(ActType::DecretoLegislativo, 2001, "165")
        );
    }

    #[test]
    fn test_partial_citation_matching_two_acts_is_ambiguous() {
        let b = graph(&[
            raw_act("legge:1991;14", &["3"]),
            raw_act("decreto.legge:2020;14", &["3"]),
        ]);
        let snap = b.snapshot();
        let dest = parse_destination("l'articolo 3 del provvedimento n. 14 è abrogato").unwrap();
        // "provvedimento n. 14" is not an act citation; resolution searches the graph
        let err = resolve(&snap, &dest, None).unwrap_err();
        match err {
            VigenzaError::AmbiguousReference { candidates, .. } => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_search_finds_single_act_with_article() {
        let b = graph(&[
            raw_act("legge:1991;14", &["3"]),
            raw_act("legge:1992;5", &["4"]),
        ]);
        let snap = b.snapshot();
        let dest = parse_destination("l'articolo 4 è abrogato").unwrap();
        let resolved = resolve(&snap, &dest, None).unwrap();
        assert_eq!(resolved.norm_id().act_id(), &ActId::new(ActType::Legge, 1992, "5"));
    }

    #[test]
    fn test_complete_citation_of_unknown_act_yields_stub() {
        let b = graph(&[]);
        let snap = b.snapshot();
        let dest = parse_destination("l'articolo 3 della legge n. 7 del 2005 è abrogato").unwrap();
        let resolved = resolve(&snap, &dest, None).unwrap();
        assert!(resolved.is_stub());
        assert_eq!(resolved.norm_id().to_string(), "urn:nir:stato:legge:2005;7~art3");
    }

    #[test]
    fn test_incomplete_citation_of_unknown_act_is_unresolved() {
        let b = graph(&[]);
        let snap = b.snapshot();
        let dest = parse_destination("art. 5 del d.lgs. n. 81").unwrap();
        assert!(matches!(
            resolve(&snap, &dest, None),
            Err(VigenzaError::UnresolvedReference(_))
        ));
    }

    #[test]
    fn test_no_act_and_no_candidates_is_unresolved() {
        let b = graph(&[raw_act("legge:1991;14", &["1"])]);
        let snap = b.snapshot();
        let dest = parse_destination("l'articolo 9 è abrogato").unwrap();
        assert!(matches!(
            resolve(&snap, &dest, None),
            Err(VigenzaError::UnresolvedReference(_))
        ));
    }
}

//! Core types for the Vigenza engine
//!
//! Closed enums for act types, amendment kinds and statuses, the [`Norm`]
//! node record, and the raw input records produced by text extraction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::identifier::NormId;

/// Types of Italian normative acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActType {
    /// Legge ordinaria
    Legge,
    /// Decreto-legge
    DecretoLegge,
    /// Decreto legislativo
    DecretoLegislativo,
    /// Decreto del Presidente della Repubblica
    DecretoPresidenteRepubblica,
    /// Regio decreto
    RegioDecreto,
    /// Decreto ministeriale
    DecretoMinisteriale,
    /// Costituzione
    Costituzione,
}

impl ActType {
    /// Name used in `urn:nir` identifiers.
    #[must_use]
    pub fn as_urn(&self) -> &'static str {
        match self {
            Self::Legge => "legge",
            Self::DecretoLegge => "decreto.legge",
            Self::DecretoLegislativo => "decreto.legislativo",
            Self::DecretoPresidenteRepubblica => "decreto.del.presidente.della.repubblica",
            Self::RegioDecreto => "regio.decreto",
            Self::DecretoMinisteriale => "decreto.ministeriale",
            Self::Costituzione => "costituzione",
        }
    }

    /// Parse the `urn:nir` act type name.
    #[must_use]
    pub fn from_urn(text: &str) -> Option<Self> {
        match text {
            "legge" => Some(Self::Legge),
            "decreto.legge" => Some(Self::DecretoLegge),
            "decreto.legislativo" => Some(Self::DecretoLegislativo),
            "decreto.del.presidente.della.repubblica" => Some(Self::DecretoPresidenteRepubblica),
            "regio.decreto" => Some(Self::RegioDecreto),
            "decreto.ministeriale" => Some(Self::DecretoMinisteriale),
            "costituzione" => Some(Self::Costituzione),
            _ => None,
        }
    }

    /// Parse the act type as written in drafting text, including the usual
    /// abbreviations ("d.lgs.", "d.P.R.", "r.d.").
    ///
    /// # Examples
    /// ```
    /// use vigenza_engine::types::ActType;
    ///
    /// assert_eq!(ActType::from_citation("d.lgs."), Some(ActType::DecretoLegislativo));
    /// assert_eq!(ActType::from_citation("decreto-legge"), Some(ActType::DecretoLegge));
    /// assert_eq!(ActType::from_citation("circolare"), None);
    /// ```
    #[must_use]
    pub fn from_citation(text: &str) -> Option<Self> {
        let compact: String = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();

        match compact.as_str() {
            "legge" | "l" => Some(Self::Legge),
            "decretolegge" | "dl" => Some(Self::DecretoLegge),
            "decretolegislativo" | "dlgs" | "dlvo" => Some(Self::DecretoLegislativo),
            "decretodelpresidentedellarepubblica" | "dpr" => {
                Some(Self::DecretoPresidenteRepubblica)
            }
            "regiodecreto" | "rd" => Some(Self::RegioDecreto),
            "decretoministeriale" | "dm" => Some(Self::DecretoMinisteriale),
            "costituzione" => Some(Self::Costituzione),
            _ => None,
        }
    }
}

/// Level at which a norm (or an amendment's destination) is scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Act,
    Article,
    Paragraph,
    Letter,
}

impl Granularity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Act => "act",
            Self::Article => "article",
            Self::Paragraph => "paragraph",
            Self::Letter => "letter",
        }
    }
}

/// Closed set of amendment operations.
///
/// `Unknown` records clauses whose verb was not recognized so that their
/// volume stays auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmendmentKind {
    /// Word-level change; content provenance only
    Modifies,
    /// Whole-provision replacement
    Replaces,
    /// Repeal (abrogazione)
    Repeals,
    /// Insertion of a new provision
    Inserts,
    /// Verb not recognized
    Unknown,
}

impl AmendmentKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modifies => "modifies",
            Self::Replaces => "replaces",
            Self::Repeals => "repeals",
            Self::Inserts => "inserts",
            Self::Unknown => "unknown",
        }
    }
}

/// Point-in-time status of a norm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormStatus {
    /// Vigente
    InForce,
    /// Abrogato at the queried granularity
    Repealed,
    /// Text replaced; identity and references persist
    Superseded,
    /// Query date precedes enactment or insertion
    NotYetInForce,
    /// No lifeline information, or the chain is cyclic
    Unknown,
}

impl NormStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InForce => "in_force",
            Self::Repealed => "repealed",
            Self::Superseded => "superseded",
            Self::NotYetInForce => "not_yet_in_force",
            Self::Unknown => "unknown",
        }
    }
}

/// Confidence of a status derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Every contributing amendment was classified
    Full,
    /// At least one contributing amendment has kind `Unknown`
    Degraded,
}

impl Confidence {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Degraded => "degraded",
        }
    }
}

/// A node in the norm graph: act, article, paragraph or lettered item.
///
/// Status is not stored here; it is derived by [`crate::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Norm {
    /// Structural identifier (immutable once assigned)
    pub id: NormId,

    /// Title, for acts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Text content; absent on stubs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Enactment date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enactment_date: Option<NaiveDate>,

    /// Placeholder created from an amendment reference
    pub is_stub: bool,
}

impl Norm {
    /// Create an ingested (non-stub) norm with no content yet.
    #[must_use]
    pub fn new(id: NormId) -> Self {
        Self {
            id,
            title: None,
            text: None,
            enactment_date: None,
            is_stub: false,
        }
    }

    /// Create a stub: no text, no dates.
    #[must_use]
    pub fn stub(id: NormId) -> Self {
        Self {
            is_stub: true,
            ..Self::new(id)
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_enactment_date(mut self, date: NaiveDate) -> Self {
        self.enactment_date = Some(date);
        self
    }

    /// Merge an incoming record into this one.
    ///
    /// Incoming data only fills fields this record lacks; a value already
    /// stored is never overwritten. The identifier never changes. A stub
    /// becomes a real node as soon as a non-stub record is merged in.
    ///
    /// # Examples
    /// ```
    /// use vigenza_engine::identifier::{ActId, NormId, ProvisionNumber};
    /// use vigenza_engine::types::{ActType, Norm};
    ///
    /// let id = NormId::article_of(ActId::new(ActType::Legge, 1991, "14"), ProvisionNumber::new(3));
    /// let stub = Norm::stub(id.clone());
    /// let merged = stub.merge(&Norm::new(id).with_text("Testo"));
    /// assert!(!merged.is_stub);
    /// assert_eq!(merged.text.as_deref(), Some("Testo"));
    /// ```
    #[must_use]
    pub fn merge(&self, incoming: &Norm) -> Norm {
        debug_assert_eq!(self.id, incoming.id, "merge requires identical identifiers");
        Norm {
            id: self.id.clone(),
            title: self.title.clone().or_else(|| incoming.title.clone()),
            text: self.text.clone().or_else(|| incoming.text.clone()),
            enactment_date: self.enactment_date.or(incoming.enactment_date),
            is_stub: self.is_stub && incoming.is_stub,
        }
    }
}

/// Raw structure of an act, as produced by text extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAct {
    /// Act identifier, e.g. `legge:1991;14` or `urn:nir:stato:legge:1991-02-10;14`
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub enactment_date: NaiveDate,

    #[serde(default)]
    pub articles: Vec<RawArticle>,
}

/// Raw article inside a [`RawAct`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArticle {
    /// Article number; may already carry the suffix ("2-bis")
    pub number: String,

    /// Separate suffix ("bis"), when extraction splits it off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,

    /// Article-level text (rubrica or unnumbered body)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default)]
    pub paragraphs: Vec<RawParagraph>,
}

/// Raw paragraph (comma) inside a [`RawArticle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParagraph {
    pub number: String,
    pub text: String,
    #[serde(default)]
    pub letters: Vec<RawLetter>,
}

/// Raw lettered item inside a [`RawParagraph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLetter {
    pub letter: String,
    pub text: String,
}

/// One amendment reference extracted from an amending act.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAmendmentClause {
    /// Amending act identifier
    pub source_act_id: String,

    /// Amending article inside the source act, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_article: Option<String>,

    /// Clause text naming the destination and the operation
    pub destination_text: String,

    pub effective_date: NaiveDate,

    /// Act being amended, when the clause does not cite it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_act_id: Option<String>,
}

/// A batch of raw acts and clauses, loaded from YAML or JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(default)]
    pub acts: Vec<RawAct>,
    #[serde(default)]
    pub clauses: Vec<RawAmendmentClause>,
}

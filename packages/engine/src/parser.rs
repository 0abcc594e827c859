//! Destination parser for amendment clauses
//!
//! Extracts the provision an amendment clause targets: an optional act
//! citation, the article, and optionally a paragraph (comma) and a lettered
//! item. Both drafting orders are recognized:
//!
//! - article first: `art. 2, comma 3, lettera a)`
//! - paragraph first: `lettera a) del comma 3 dell'articolo 2`
//!
//! Text between quotation marks («...») is the new wording introduced by the
//! amendment and never contributes a reference, except for the heading of an
//! inserted provision (`«Art. 2-bis ...` or `«2-bis. ...`).
//!
//! # Example
//!
//! ```
//! use vigenza_engine::parser::parse_destination;
//!
//! let dest = parse_destination("il comma 3 dell'articolo 2-bis è abrogato").unwrap();
//! assert_eq!(dest.article.to_string(), "2-bis");
//! assert_eq!(dest.paragraph.map(|p| p.to_string()), Some("3".to_string()));
//! ```

use regex::{Captures, Regex};
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{Result, VigenzaError};
use crate::identifier::{
    normalize_act_number, ActId, ItemLetter, LatinSuffix, ProvisionNumber, SUFFIX_ALTERNATION,
};
use crate::types::{ActType, Granularity};

const MONTHS: &str =
    "gennaio|febbraio|marzo|aprile|maggio|giugno|luglio|agosto|settembre|ottobre|novembre|dicembre";

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ARTICLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:articol[oi]|artt?\.?)\s*(\d+)(?:\s*-?\s*({SUFFIX_ALTERNATION})\b)?"
    ))
    .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bcomm[ai]\s+(\d+)(?:\s*-?\s*({SUFFIX_ALTERNATION})\b)?"
    ))
    .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LETTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\blettera\s+([a-z]{{1,3}})\b(?:\s*-?\s*({SUFFIX_ALTERNATION})\b)?\s*\)?"
    ))
    .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ACT_CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(decreto\s+del\s+presidente\s+della\s+repubblica|decreto\s+legislativo|decreto[\s-]legge|decreto\s+ministeriale|regio\s+decreto|legge|d\.\s*p\.\s*r\.|d\.\s*lgs\.?|d\.\s*l\.|r\.\s*d\.|d\.\s*m\.|l\.)\s*(?:\d{{1,2}}[°º]?\s+(?:{MONTHS})\s+(\d{{4}})\s*,?\s*)?(?:n\.|numero)\s*(\d+)(?:\s*(?:del|/)\s*(\d{{4}}))?"
    ))
    .expect("valid regex")
});

/// Gap text allowed between two components of the same reference.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static CONNECTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[\s,]*(?:(?:del|dello|della|dei|degli|delle|dell['’]|al|allo|alla|all['’]|nel|nello|nella|nell['’]|di|d['’])\s*)?(?:(?:il|lo|la|i|gli|le)\s+|l['’]\s*)?(?:(?:citat|predett|medesim)[oaie]\s*)?[\s,]*$",
    )
    .expect("valid regex")
});

/// Text right before a component that makes its group an insertion anchor.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ANCHOR_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdopo\s+(?:il|lo|la|i|le|l['’])?\s*$").expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static INSERTION_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:inserit[aeio]|aggiunt[aeio])\b").expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"«[^»]*»|“[^”]*”|"[^"]*""#).expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static HEADING_ARTICLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^[«“\x22]\s*(?:articolo|art\.?)\s*(\d+)(?:\s*-?\s*({SUFFIX_ALTERNATION})\b)?"
    ))
    .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static HEADING_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^[«“\x22]\s*(\d+)(?:\s*-?\s*({SUFFIX_ALTERNATION})\b)?\s*\."
    ))
    .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static HEADING_LETTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^[«“\x22]\s*([a-z]{{1,3}})\b(?:\s*-?\s*({SUFFIX_ALTERNATION})\b)?\s*\)"
    ))
    .expect("valid regex")
});

/// A possibly incomplete act citation ("legge n. 14 del 1991").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ActRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_type: Option<ActType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub number: String,
}

impl ActRef {
    /// Whether every component this citation specifies equals the act's.
    #[must_use]
    pub fn matches(&self, act: &ActId) -> bool {
        self.act_type.map_or(true, |t| t == act.act_type())
            && self.year.map_or(true, |y| y == act.year())
            && normalize_act_number(&self.number) == act.number()
    }

    /// The act id, when the citation is complete.
    #[must_use]
    pub fn to_act_id(&self) -> Option<ActId> {
        Some(ActId::new(self.act_type?, self.year?, self.number.clone()))
    }
}

impl From<&ActId> for ActRef {
    fn from(act: &ActId) -> Self {
        Self {
            act_type: Some(act.act_type()),
            year: Some(act.year()),
            number: act.number().to_string(),
        }
    }
}

impl fmt::Display for ActRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(t) = self.act_type {
            write!(f, "{} ", t.as_urn())?;
        }
        write!(f, "n. {}", self.number)?;
        if let Some(y) = self.year {
            write!(f, " del {y}")?;
        }
        Ok(())
    }
}

/// Parsed destination of an amendment clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act: Option<ActRef>,
    #[serde(serialize_with = "serialize_display")]
    pub article: ProvisionNumber,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_display_opt"
    )]
    pub paragraph: Option<ProvisionNumber>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_display_opt"
    )]
    pub letter: Option<ItemLetter>,
    /// Original clause text, kept for audit
    pub raw: String,
}

impl DestinationRef {
    /// Level at which the amendment is scoped.
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        if self.letter.is_some() {
            Granularity::Letter
        } else if self.paragraph.is_some() {
            Granularity::Paragraph
        } else {
            Granularity::Article
        }
    }
}

impl DestinationRef {
    /// Use `act` when the clause text does not cite one.
    #[must_use]
    pub fn with_default_act(mut self, act: &ActId) -> Self {
        if self.act.is_none() {
            self.act = Some(ActRef::from(act));
        }
        self
    }
}

impl fmt::Display for DestinationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "art. {}", self.article)?;
        if let Some(p) = &self.paragraph {
            write!(f, ", comma {p}")?;
        }
        if let Some(l) = &self.letter {
            write!(f, ", lettera {l})")?;
        }
        if let Some(act) = &self.act {
            write!(f, " ({act})")?;
        }
        Ok(())
    }
}

fn serialize_display<T: fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn serialize_display_opt<T: fmt::Display, S: serde::Serializer>(
    value: &Option<T>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.collect_str(v),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone)]
enum ComponentValue {
    Act(ActRef),
    Article(ProvisionNumber),
    Paragraph(ProvisionNumber),
    Letter(ItemLetter),
}

#[derive(Debug, Clone)]
struct Component {
    start: usize,
    end: usize,
    value: ComponentValue,
}

/// Components that read as one reference ("comma 3 dell'articolo 2").
#[derive(Debug, Clone, Default)]
struct RefGroup {
    act: Option<ActRef>,
    article: Option<ProvisionNumber>,
    paragraph: Option<ProvisionNumber>,
    letter: Option<ItemLetter>,
    is_anchor: bool,
}

impl RefGroup {
    /// Add a component; returns `false` if the group already has one of
    /// that kind, which starts a new reference.
    fn accept(&mut self, value: &ComponentValue) -> bool {
        match value {
            ComponentValue::Act(a) if self.act.is_none() => self.act = Some(a.clone()),
            ComponentValue::Article(n) if self.article.is_none() => self.article = Some(*n),
            ComponentValue::Paragraph(n) if self.paragraph.is_none() => {
                self.paragraph = Some(*n)
            }
            ComponentValue::Letter(l) if self.letter.is_none() => self.letter = Some(l.clone()),
            _ => return false,
        }
        true
    }

    fn has_provision(&self) -> bool {
        self.article.is_some() || self.paragraph.is_some() || self.letter.is_some()
    }
}

/// Heading of a provision introduced by an insertion clause.
#[derive(Debug, Clone)]
enum Heading {
    Article(ProvisionNumber),
    Paragraph(ProvisionNumber),
    Letter(ItemLetter),
}

fn provision_from(caps: &Captures<'_>) -> Option<ProvisionNumber> {
    let base = caps.get(1)?.as_str().parse::<u32>().ok()?;
    Some(
        match caps.get(2).and_then(|m| LatinSuffix::from_word(m.as_str())) {
            Some(suffix) => ProvisionNumber::with_suffix(base, suffix),
            None => ProvisionNumber::new(base),
        },
    )
}

fn letter_from(caps: &Captures<'_>) -> Option<ItemLetter> {
    let letter = caps.get(1)?.as_str();
    let text = match caps.get(2) {
        Some(suffix) => format!("{letter}-{}", suffix.as_str()),
        None => letter.to_string(),
    };
    text.parse().ok()
}

fn act_from(caps: &Captures<'_>) -> Option<ActRef> {
    let act_type = caps.get(1).and_then(|m| ActType::from_citation(m.as_str()));
    let year = caps
        .get(2)
        .or_else(|| caps.get(4))
        .and_then(|m| m.as_str().parse::<i32>().ok());
    let number = caps.get(3)?.as_str().to_string();
    Some(ActRef {
        act_type,
        year,
        number,
    })
}

fn collect_components(text: &str) -> Vec<Component> {
    let mut components = Vec::new();

    for caps in ACT_CITATION.captures_iter(text) {
        if let (Some(m), Some(act)) = (caps.get(0), act_from(&caps)) {
            components.push(Component {
                start: m.start(),
                end: m.end(),
                value: ComponentValue::Act(act),
            });
        }
    }
    for caps in ARTICLE.captures_iter(text) {
        if let (Some(m), Some(n)) = (caps.get(0), provision_from(&caps)) {
            components.push(Component {
                start: m.start(),
                end: m.end(),
                value: ComponentValue::Article(n),
            });
        }
    }
    for caps in PARAGRAPH.captures_iter(text) {
        if let (Some(m), Some(n)) = (caps.get(0), provision_from(&caps)) {
            components.push(Component {
                start: m.start(),
                end: m.end(),
                value: ComponentValue::Paragraph(n),
            });
        }
    }
    for caps in LETTER.captures_iter(text) {
        if let (Some(m), Some(l)) = (caps.get(0), letter_from(&caps)) {
            components.push(Component {
                start: m.start(),
                end: m.end(),
                value: ComponentValue::Letter(l),
            });
        }
    }

    components.sort_by_key(|c| c.start);
    components
}

fn group_components(text: &str, components: &[Component]) -> Vec<RefGroup> {
    let mut groups: Vec<RefGroup> = Vec::new();
    let mut current: Option<RefGroup> = None;
    let mut last_end = 0;

    for component in components {
        // Overlapping matches (e.g. "l." inside another citation) are dropped
        if component.start < last_end {
            continue;
        }

        let joined = match current.as_mut() {
            Some(group) => {
                CONNECTOR.is_match(&text[last_end..component.start])
                    && group.accept(&component.value)
            }
            None => false,
        };

        if !joined {
            if let Some(done) = current.take() {
                groups.push(done);
            }
            let mut group = RefGroup {
                is_anchor: ANCHOR_PREFIX.is_match(&text[..component.start]),
                ..RefGroup::default()
            };
            group.accept(&component.value);
            current = Some(group);
        }
        last_end = component.end;
    }

    if let Some(done) = current {
        groups.push(done);
    }
    groups
}

/// Fill the levels a group leaves out from the nearest preceding group, as in
/// "all'articolo 3, dopo il comma 2, ..." where the second group inherits the
/// article of the first.
fn inherit_context(groups: &mut [RefGroup]) {
    let mut context_act: Option<ActRef> = None;
    let mut context_article: Option<ProvisionNumber> = None;
    let mut context_paragraph: Option<ProvisionNumber> = None;

    for group in groups.iter_mut() {
        if group.article.is_none() && group.has_provision() {
            group.article = context_article;
            if group.paragraph.is_none() && group.letter.is_some() {
                group.paragraph = context_paragraph;
            }
        }
        if group.act.is_none() {
            group.act.clone_from(&context_act);
        }

        if group.act.is_some() {
            context_act.clone_from(&group.act);
        }
        if group.article.is_some() {
            context_article = group.article;
            context_paragraph = group.paragraph;
        }
    }
}

fn find_heading(text: &str) -> Option<Heading> {
    let quoted = QUOTED.find(text)?.as_str();
    if let Some(caps) = HEADING_ARTICLE.captures(quoted) {
        return provision_from(&caps).map(Heading::Article);
    }
    if let Some(caps) = HEADING_PARAGRAPH.captures(quoted) {
        return provision_from(&caps).map(Heading::Paragraph);
    }
    if let Some(caps) = HEADING_LETTER.captures(quoted) {
        return letter_from(&caps).map(Heading::Letter);
    }
    None
}

fn apply_heading(group: &mut RefGroup, heading: Heading) {
    match heading {
        Heading::Article(n) => {
            group.article = Some(n);
            group.paragraph = None;
            group.letter = None;
        }
        Heading::Paragraph(n) => {
            group.paragraph = Some(n);
            group.letter = None;
        }
        Heading::Letter(l) => group.letter = Some(l),
    }
}

/// Parse the destination of an amendment clause.
///
/// # Errors
///
/// Returns `VigenzaError::ParseFailure` carrying the original text when no
/// article-level reference can be extracted.
pub fn parse_destination(text: &str) -> Result<DestinationRef> {
    let failure = |reason: &str| VigenzaError::ParseFailure {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    if text.trim().is_empty() {
        return Err(failure("empty destination"));
    }

    // Mask quoted new wording, keeping byte offsets aligned
    let masked = QUOTED.replace_all(text, |caps: &Captures<'_>| "#".repeat(caps[0].len()));
    let components = collect_components(&masked);
    let mut groups = group_components(&masked, &components);
    inherit_context(&mut groups);

    let heading = find_heading(text);
    let anchor = groups
        .iter()
        .find(|g| g.is_anchor && g.article.is_some())
        .cloned();

    let primary = groups
        .iter()
        .find(|g| !g.is_anchor && g.article.is_some())
        .or_else(|| groups.iter().find(|g| g.article.is_some()))
        .cloned();

    let chosen = match (heading, anchor) {
        (Some(heading), Some(mut anchor)) => {
            apply_heading(&mut anchor, heading);
            Some(anchor)
        }
        // "all'articolo 5 è aggiunto il seguente comma: «4. ...»" names the
        // container, and the heading names the new provision inside it
        (Some(heading), None) if INSERTION_VERB.is_match(&masked) => primary.map(|mut group| {
            let below = match &heading {
                Heading::Article(_) => false,
                Heading::Paragraph(_) => group.paragraph.is_none() && group.letter.is_none(),
                Heading::Letter(_) => group.letter.is_none(),
            };
            if below {
                apply_heading(&mut group, heading);
            }
            group
        }),
        _ => primary,
    };

    let group = chosen.ok_or_else(|| failure("no article reference"))?;
    let article = group
        .article
        .ok_or_else(|| failure("no article reference"))?;

    let destination = DestinationRef {
        act: group.act,
        article,
        paragraph: group.paragraph,
        letter: group.letter,
        raw: text.to_string(),
    };
    tracing::trace!(destination = %destination, "Parsed destination");
    Ok(destination)
}

//! Structural identifiers for acts and norms
//!
//! Identifiers compare by parsed components, never by text. Article "1" and
//! article "14" share a textual prefix but are different [`ProvisionNumber`]s,
//! and "2-bis", "2 bis" and "2bis" are the same one.
//!
//! # Formats
//!
//! 1. **Act id**: `{act_type}:{year};{number}`, e.g. `legge:1991;14`. Parsing
//!    also accepts an `urn:nir:stato:` prefix and a full date
//!    (`legge:1991-02-10;14`).
//! 2. **Norm id**: `urn:nir:stato:{act}~art{n}[-com{p}][-let{x}]`, e.g.
//!    `urn:nir:stato:legge:1991;14~art2bis-com2-leta`.
//!
//! # Examples
//!
//! ```
//! use vigenza_engine::identifier::{NormId, ProvisionNumber};
//!
//! let id: NormId = "urn:nir:stato:legge:1991;14~art2bis-com2".parse().unwrap();
//! assert_eq!(id.article(), Some(&"2-bis".parse::<ProvisionNumber>().unwrap()));
//! assert_eq!(id.to_string(), "urn:nir:stato:legge:1991;14~art2bis-com2");
//! assert_eq!(id.parent().unwrap().to_string(), "urn:nir:stato:legge:1991;14~art2bis");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Result, VigenzaError};
use crate::types::{ActType, Granularity};

/// Prefix of every norm URN.
pub const URN_PREFIX: &str = "urn:nir:stato:";

/// Regex alternation of Latin suffix words, longest first so that
/// "terdecies" is never read as "ter" followed by garbage.
pub(crate) const SUFFIX_ALTERNATION: &str = "quinquiesdecies|septiesdecies|sexiesdecies|\
quaterdecies|octiesdecies|noviesdecies|duodevicies|undevicies|terdecies|duodecies|undecies|\
quinquies|quater|sexies|septies|octies|novies|nonies|decies|vicies|bis|ter";

/// Latin ordinal suffix of an inserted provision (2-bis, 2-ter, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LatinSuffix {
    Bis,
    Ter,
    Quater,
    Quinquies,
    Sexies,
    Septies,
    Octies,
    Novies,
    Decies,
    Undecies,
    Duodecies,
    Terdecies,
    Quaterdecies,
    Quinquiesdecies,
    Sexiesdecies,
    Septiesdecies,
    Duodevicies,
    Undevicies,
    Vicies,
}

impl LatinSuffix {
    /// Parse a suffix word, case-insensitively. Accepts the common
    /// alternative spellings (nonies, octiesdecies, noviesdecies).
    #[must_use]
    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "bis" => Some(Self::Bis),
            "ter" => Some(Self::Ter),
            "quater" => Some(Self::Quater),
            "quinquies" => Some(Self::Quinquies),
            "sexies" => Some(Self::Sexies),
            "septies" => Some(Self::Septies),
            "octies" => Some(Self::Octies),
            "novies" | "nonies" => Some(Self::Novies),
            "decies" => Some(Self::Decies),
            "undecies" => Some(Self::Undecies),
            "duodecies" => Some(Self::Duodecies),
            "terdecies" => Some(Self::Terdecies),
            "quaterdecies" => Some(Self::Quaterdecies),
            "quinquiesdecies" => Some(Self::Quinquiesdecies),
            "sexiesdecies" => Some(Self::Sexiesdecies),
            "septiesdecies" => Some(Self::Septiesdecies),
            "duodevicies" | "octiesdecies" => Some(Self::Duodevicies),
            "undevicies" | "noviesdecies" => Some(Self::Undevicies),
            "vicies" => Some(Self::Vicies),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bis => "bis",
            Self::Ter => "ter",
            Self::Quater => "quater",
            Self::Quinquies => "quinquies",
            Self::Sexies => "sexies",
            Self::Septies => "septies",
            Self::Octies => "octies",
            Self::Novies => "novies",
            Self::Decies => "decies",
            Self::Undecies => "undecies",
            Self::Duodecies => "duodecies",
            Self::Terdecies => "terdecies",
            Self::Quaterdecies => "quaterdecies",
            Self::Quinquiesdecies => "quinquiesdecies",
            Self::Sexiesdecies => "sexiesdecies",
            Self::Septiesdecies => "septiesdecies",
            Self::Duodevicies => "duodevicies",
            Self::Undevicies => "undevicies",
            Self::Vicies => "vicies",
        }
    }
}

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PROVISION_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?i)(\d+)(?:\s*-?\s*({SUFFIX_ALTERNATION}))?\s*\.?$"
    ))
    .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ITEM_LETTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?i)([a-z]{{1,3}}?)(?:\s*-?\s*({SUFFIX_ALTERNATION}))?\s*\)?$"
    ))
    .expect("valid regex")
});

/// Article or paragraph number: numeric base plus optional Latin suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProvisionNumber {
    base: u32,
    suffix: Option<LatinSuffix>,
}

impl ProvisionNumber {
    #[must_use]
    pub fn new(base: u32) -> Self {
        Self { base, suffix: None }
    }

    #[must_use]
    pub fn with_suffix(base: u32, suffix: LatinSuffix) -> Self {
        Self {
            base,
            suffix: Some(suffix),
        }
    }

    #[must_use]
    pub fn base(&self) -> u32 {
        self.base
    }

    #[must_use]
    pub fn suffix(&self) -> Option<LatinSuffix> {
        self.suffix
    }

    /// Compact form used inside URNs ("2bis").
    fn urn_segment(&self) -> String {
        match self.suffix {
            Some(s) => format!("{}{}", self.base, s.as_str()),
            None => self.base.to_string(),
        }
    }
}

impl FromStr for ProvisionNumber {
    type Err = VigenzaError;

    /// Parse "2", "2-bis", "2 bis", "2bis", "2-BIS", "2 bis.".
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || VigenzaError::InvalidIdentifier(format!("provision number '{s}'"));
        let caps = PROVISION_NUMBER.captures(s.trim()).ok_or_else(invalid)?;
        let base = caps[1].parse::<u32>().map_err(|_| invalid())?;
        let suffix = caps.get(2).and_then(|m| LatinSuffix::from_word(m.as_str()));
        Ok(Self { base, suffix })
    }
}

impl fmt::Display for ProvisionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suffix {
            Some(s) => write!(f, "{}-{}", self.base, s.as_str()),
            None => write!(f, "{}", self.base),
        }
    }
}

/// Lettered item ("lettera a)", "lettera a-bis)").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemLetter {
    letter: String,
    suffix: Option<LatinSuffix>,
}

impl ItemLetter {
    #[must_use]
    pub fn letter(&self) -> &str {
        &self.letter
    }

    #[must_use]
    pub fn suffix(&self) -> Option<LatinSuffix> {
        self.suffix
    }

    fn urn_segment(&self) -> String {
        match self.suffix {
            Some(s) => format!("{}{}", self.letter, s.as_str()),
            None => self.letter.clone(),
        }
    }
}

impl FromStr for ItemLetter {
    type Err = VigenzaError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = ITEM_LETTER
            .captures(s.trim())
            .ok_or_else(|| VigenzaError::InvalidIdentifier(format!("item letter '{s}'")))?;
        Ok(Self {
            letter: caps[1].to_lowercase(),
            suffix: caps.get(2).and_then(|m| LatinSuffix::from_word(m.as_str())),
        })
    }
}

impl fmt::Display for ItemLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suffix {
            Some(s) => write!(f, "{}-{}", self.letter, s.as_str()),
            None => write!(f, "{}", self.letter),
        }
    }
}

/// Identity of an act: type, year and number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActId {
    act_type: ActType,
    year: i32,
    number: String,
}

impl ActId {
    /// Create an act id. Leading zeros of a numeric act number are dropped.
    #[must_use]
    pub fn new(act_type: ActType, year: i32, number: impl Into<String>) -> Self {
        Self {
            act_type,
            year,
            number: normalize_act_number(&number.into()),
        }
    }

    #[must_use]
    pub fn act_type(&self) -> ActType {
        self.act_type
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn number(&self) -> &str {
        &self.number
    }
}

pub(crate) fn normalize_act_number(number: &str) -> String {
    let trimmed = number.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        let stripped = trimmed.trim_start_matches('0');
        if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        }
    } else {
        trimmed.to_lowercase()
    }
}

impl FromStr for ActId {
    type Err = VigenzaError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || VigenzaError::InvalidIdentifier(format!("act id '{s}'"));
        let text = s.trim();
        let text = text.strip_prefix(URN_PREFIX).unwrap_or(text);

        let (type_part, rest) = text.split_once(':').ok_or_else(invalid)?;
        let act_type = ActType::from_urn(type_part).ok_or_else(invalid)?;
        let (date_part, number) = rest.split_once(';').ok_or_else(invalid)?;

        // Either a bare year or a full YYYY-MM-DD date
        let year_text = date_part.split('-').next().unwrap_or_default();
        if year_text.len() != 4 {
            return Err(invalid());
        }
        let year = year_text.parse::<i32>().map_err(|_| invalid())?;
        if number.trim().is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(act_type, year, number))
    }
}

impl fmt::Display for ActId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{};{}", self.act_type.as_urn(), self.year, self.number)
    }
}

/// Identifier of a norm node at any granularity.
///
/// Ordering puts a parent before its children, so a sorted map of norms
/// reads like the act itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NormId {
    act: ActId,
    article: Option<ProvisionNumber>,
    paragraph: Option<ProvisionNumber>,
    letter: Option<ItemLetter>,
}

impl NormId {
    /// Identifier of the act itself.
    #[must_use]
    pub fn act(act: ActId) -> Self {
        Self {
            act,
            article: None,
            paragraph: None,
            letter: None,
        }
    }

    /// Identifier of an article.
    #[must_use]
    pub fn article_of(act: ActId, article: ProvisionNumber) -> Self {
        Self {
            article: Some(article),
            ..Self::act(act)
        }
    }

    /// Narrow an article-level id to one of its paragraphs.
    #[must_use]
    pub fn with_paragraph(mut self, paragraph: ProvisionNumber) -> Self {
        debug_assert!(self.article.is_some(), "paragraph requires an article");
        self.paragraph = Some(paragraph);
        self
    }

    /// Narrow to a lettered item (of the paragraph, or directly of the article).
    #[must_use]
    pub fn with_letter(mut self, letter: ItemLetter) -> Self {
        debug_assert!(self.article.is_some(), "letter requires an article");
        self.letter = Some(letter);
        self
    }

    #[must_use]
    pub fn act_id(&self) -> &ActId {
        &self.act
    }

    #[must_use]
    pub fn article(&self) -> Option<&ProvisionNumber> {
        self.article.as_ref()
    }

    #[must_use]
    pub fn paragraph(&self) -> Option<&ProvisionNumber> {
        self.paragraph.as_ref()
    }

    #[must_use]
    pub fn letter(&self) -> Option<&ItemLetter> {
        self.letter.as_ref()
    }

    /// Most specific level this identifier names.
    #[must_use]
    pub fn granularity(&self) -> Granularity {
        if self.letter.is_some() {
            Granularity::Letter
        } else if self.paragraph.is_some() {
            Granularity::Paragraph
        } else if self.article.is_some() {
            Granularity::Article
        } else {
            Granularity::Act
        }
    }

    /// Containing norm, or `None` for an act.
    #[must_use]
    pub fn parent(&self) -> Option<NormId> {
        let mut parent = self.clone();
        if parent.letter.take().is_some() {
            return Some(parent);
        }
        if parent.paragraph.take().is_some() {
            return Some(parent);
        }
        if parent.article.take().is_some() {
            return Some(parent);
        }
        None
    }

    /// All containing norms, nearest first.
    #[must_use]
    pub fn ancestors(&self) -> Vec<NormId> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(id) = current {
            current = id.parent();
            out.push(id);
        }
        out
    }

    /// Whether `self` strictly contains `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &NormId) -> bool {
        if self.act != other.act || self.granularity() >= other.granularity() {
            return false;
        }
        // Every component self specifies must match exactly; the ones it
        // leaves out are below its own level.
        let article_ok = self.article.is_none() || self.article == other.article;
        let paragraph_ok = self.paragraph.is_none() || self.paragraph == other.paragraph;
        let letter_ok = self.letter.is_none() || self.letter == other.letter;
        article_ok && paragraph_ok && letter_ok
    }
}

impl FromStr for NormId {
    type Err = VigenzaError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || VigenzaError::InvalidIdentifier(format!("norm id '{s}'"));
        let text = s.trim();
        let (act_part, path) = match text.split_once('~') {
            Some((a, p)) => (a, Some(p)),
            None => (text, None),
        };
        let mut id = NormId::act(act_part.parse()?);

        let Some(path) = path else {
            return Ok(id);
        };

        for segment in path.split('-') {
            if let Some(n) = segment.strip_prefix("art") {
                if id.article.is_some() {
                    return Err(invalid());
                }
                id.article = Some(n.parse()?);
            } else if let Some(n) = segment.strip_prefix("com") {
                if id.article.is_none() || id.paragraph.is_some() || id.letter.is_some() {
                    return Err(invalid());
                }
                id.paragraph = Some(n.parse()?);
            } else if let Some(l) = segment.strip_prefix("let") {
                if id.article.is_none() || id.letter.is_some() {
                    return Err(invalid());
                }
                id.letter = Some(l.parse()?);
            } else {
                return Err(invalid());
            }
        }

        if id.article.is_none() {
            return Err(invalid());
        }
        Ok(id)
    }
}

impl fmt::Display for NormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{URN_PREFIX}{}", self.act)?;
        if let Some(article) = &self.article {
            write!(f, "~art{}", article.urn_segment())?;
            if let Some(paragraph) = &self.paragraph {
                write!(f, "-com{}", paragraph.urn_segment())?;
            }
            if let Some(letter) = &self.letter {
                write!(f, "-let{}", letter.urn_segment())?;
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for NormId {
    type Error = VigenzaError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<NormId> for String {
    fn from(id: NormId) -> Self {
        id.to_string()
    }
}

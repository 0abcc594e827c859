//! Amendment classifier
//!
//! Maps the operative verb of a clause to an [`AmendmentKind`]. Word-level
//! operations ("le parole ... sono sostituite") are modifications of content,
//! not replacements of the provision, and are checked first.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Result, VigenzaError};
use crate::types::AmendmentKind;

/// Patterns in priority order; the first match decides the kind.
#[allow(clippy::expect_used)] // Static regexes that are guaranteed to be valid
static RULES: LazyLock<Vec<(AmendmentKind, Regex)>> = LazyLock::new(|| {
    [
        (
            AmendmentKind::Modifies,
            r"(?i)\b(?:le\s+parol[ae]|la\s+parola|il\s+periodo|i\s+periodi|le\s+cifre|la\s+cifra)\b[\s\S]*\b(?:sostituit[aeio]|soppress[aeio]|aggiunt[aeio]|inserit[aeio])\b",
        ),
        (AmendmentKind::Modifies, r"(?i)\bmodificat[aeio]\b|\b(?:amended|modified)\b"),
        (
            AmendmentKind::Repeals,
            r"(?i)\babrogat[aeio]\b|\bsoppress[aeio]\b|\brepealed\b",
        ),
        (
            AmendmentKind::Replaces,
            r"(?i)\bsostituit[aeio]\b|\breplaced\b|\bsubstituted\b",
        ),
        (
            AmendmentKind::Inserts,
            r"(?i)\binserit[aeio]\b|\baggiunt[aeio]\b|\binserted\b|\badded\b",
        ),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("valid regex")))
    .collect()
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"«[^»]*»|“[^”]*”"#).expect("valid regex"));

/// Classify a clause by its operative verb.
///
/// Quoted new wording is ignored, so a replacement text that itself mentions
/// an abrogation does not change the classification.
///
/// # Errors
///
/// Returns `VigenzaError::UnclassifiedAmendment` when no rule matches. The
/// caller records such clauses with kind [`AmendmentKind::Unknown`].
///
/// # Examples
/// ```
/// use vigenza_engine::classifier::classify;
/// use vigenza_engine::types::AmendmentKind;
///
/// assert_eq!(classify("l'articolo 3 è abrogato").unwrap(), AmendmentKind::Repeals);
/// assert!(classify("l'articolo 3 si interpreta nel senso che").is_err());
/// ```
pub fn classify(text: &str) -> Result<AmendmentKind> {
    let operative = QUOTED.replace_all(text, " ");
    RULES
        .iter()
        .find(|(_, pattern)| pattern.is_match(&operative))
        .map(|(kind, _)| *kind)
        .ok_or_else(|| VigenzaError::UnclassifiedAmendment(text.to_string()))
}

/// Classify, recording unrecognized verbs as [`AmendmentKind::Unknown`].
#[must_use]
pub fn classify_or_unknown(text: &str) -> AmendmentKind {
    match classify(text) {
        Ok(kind) => kind,
        Err(e) => {
            tracing::debug!(error = %e, "Amendment kind not recognized");
            AmendmentKind::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeals() {
        assert_eq!(classify("l'articolo 3 è abrogato").unwrap(), AmendmentKind::Repeals);
        assert_eq!(
            classify("i commi 2 e 3 sono abrogati").unwrap(),
            AmendmentKind::Repeals
        );
        assert_eq!(
            classify("la lettera b) è soppressa").unwrap(),
            AmendmentKind::Repeals
        );
        assert_eq!(classify("Art. 4 is repealed").unwrap(), AmendmentKind::Repeals);
    }

    #[test]
    fn test_replaces() {
        assert_eq!(
            classify("il comma 1 è sostituito dal seguente: «1. Nuovo testo.»").unwrap(),
            AmendmentKind::Replaces
        );
        assert_eq!(
            classify("art. 2, comma 3 is replaced by art. 12, comma 1").unwrap(),
            AmendmentKind::Replaces
        );
    }

    #[test]
    fn test_word_level_change_is_modification() {
        assert_eq!(
            classify("al comma 2, le parole «trenta giorni» sono sostituite dalle seguenti: «sessanta giorni»")
                .unwrap(),
            AmendmentKind::Modifies
        );
        assert_eq!(
            classify("al comma 1, la parola «annuale» è soppressa").unwrap(),
            AmendmentKind::Modifies
        );
        assert_eq!(
            classify("l'articolo 7 è così modificato").unwrap(),
            AmendmentKind::Modifies
        );
    }

    #[test]
    fn test_inserts() {
        assert_eq!(
            classify("dopo l'articolo 2 è inserito il seguente: «Art. 2-bis»").unwrap(),
            AmendmentKind::Inserts
        );
        assert_eq!(
            classify("all'articolo 5 è aggiunto, in fine, il seguente comma").unwrap(),
            AmendmentKind::Inserts
        );
    }

    #[test]
    fn test_quoted_text_does_not_classify() {
        assert_eq!(
            classify("il comma 1 è sostituito dal seguente: «1. Il comma 4 è abrogato.»").unwrap(),
            AmendmentKind::Replaces
        );
    }

    #[test]
    fn test_unclassified_keeps_text() {
        let err = classify("l'articolo 9 si applica anche alle regioni").unwrap_err();
        assert!(matches!(err, VigenzaError::UnclassifiedAmendment(ref t) if t.contains("articolo 9")));
        assert_eq!(
            classify_or_unknown("l'articolo 9 si applica anche alle regioni"),
            AmendmentKind::Unknown
        );
    }
}

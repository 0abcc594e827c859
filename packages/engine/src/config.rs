//! Configuration for the Vigenza engine
//!
//! Centralized limits used throughout the engine for:
//! - Bounding amendment chain traversal (cyclic or pathological data)
//! - Retrying optimistic upserts under contention
//! - Rejecting oversized batch files before parsing
//!
//! The limits are compile-time defaults; [`EngineConfig::from_env`] lets a
//! deployment override the ones that matter at runtime.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{Result, VigenzaError};

/// Maximum number of replacement hops followed when resolving the active text.
///
/// Real replacement chains are short (a provision is rarely rewritten more
/// than a handful of times); anything longer is treated as pathological.
pub const MAX_CHAIN_DEPTH: usize = 64;

/// Maximum number of attempts for a single upsert under contention.
pub const MAX_UPSERT_RETRIES: usize = 8;

/// Maximum batch document size in bytes (16 MB).
pub const MAX_BATCH_SIZE: usize = 16 * 1024 * 1024;

/// Maximum number of amendment clauses accepted in one batch.
pub const MAX_BATCH_CLAUSES: usize = 100_000;

/// Date pattern: YYYY-MM-DD.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));

/// Runtime-tunable engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Replacement hops followed before a chain is reported as cyclic
    pub max_chain_depth: usize,
    /// Upsert attempts before a `StoreConflict` is returned to the caller
    pub max_upsert_retries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: MAX_CHAIN_DEPTH,
            max_upsert_retries: MAX_UPSERT_RETRIES,
        }
    }
}

impl EngineConfig {
    /// Read overrides from `VIGENZA_MAX_CHAIN_DEPTH` and
    /// `VIGENZA_MAX_UPSERT_RETRIES`. Unset or unparsable values fall back to
    /// the defaults; zero is clamped to one.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_chain_depth = std::env::var("VIGENZA_MAX_CHAIN_DEPTH")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.max_chain_depth)
            .max(1);

        let max_upsert_retries = std::env::var("VIGENZA_MAX_UPSERT_RETRIES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.max_upsert_retries)
            .max(1);

        Self {
            max_chain_depth,
            max_upsert_retries,
        }
    }
}

/// Validate date format (YYYY-MM-DD) and that it is a real calendar date.
///
/// # Examples
/// ```
/// use vigenza_engine::config::validate_date;
///
/// assert!(validate_date("2021-06-01").is_ok());
/// assert!(validate_date("invalid").is_err());
/// assert!(validate_date("2021-13-01").is_err()); // Invalid month
/// ```
pub fn validate_date(date_str: &str) -> Result<()> {
    parse_date(date_str).map(|_| ())
}

/// Parse a YYYY-MM-DD date.
///
/// # Errors
///
/// Returns `VigenzaError::InvalidDate` if the text is not a valid date.
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    if !DATE_PATTERN.is_match(date_str) {
        return Err(VigenzaError::InvalidDate(date_str.to_string()));
    }

    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| VigenzaError::InvalidDate(date_str.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_reasonable() {
        assert!(MAX_CHAIN_DEPTH >= 8, "Should allow realistic chains");
        assert!(MAX_CHAIN_DEPTH <= 1024, "Should bound traversal");

        assert!(MAX_UPSERT_RETRIES >= 1, "Should attempt at least once");
        assert!(MAX_UPSERT_RETRIES <= 100, "Should not spin forever");

        assert!(MAX_BATCH_SIZE >= 1_000_000, "Should allow at least 1MB");
        assert!(MAX_BATCH_CLAUSES >= 1_000, "Should allow real batches");
    }

    #[test]
    fn test_default_config_uses_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.max_chain_depth, MAX_CHAIN_DEPTH);
        assert_eq!(config.max_upsert_retries, MAX_UPSERT_RETRIES);
    }

    #[test]
    fn test_parse_date_valid() {
        let date = parse_date("2020-07-14").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2020, 7, 14).unwrap());
    }

    #[test]
    fn test_parse_date_invalid_format() {
        assert!(parse_date("").is_err());
        assert!(parse_date("2021/01/01").is_err());
        assert!(parse_date("01-01-2021").is_err());
        assert!(parse_date("2021-1-1").is_err());
    }

    #[test]
    fn test_parse_date_invalid_date() {
        assert!(parse_date("2021-02-30").is_err());
        assert!(parse_date("2021-00-01").is_err());
    }
}

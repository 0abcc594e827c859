//! Error types for the CLI.

use thiserror::Error;
use vigenza_engine::VigenzaError;

/// Main error type for the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Failure reported by the engine (loading, parsing, lookup).
    #[error(transparent)]
    Engine(#[from] VigenzaError),

    /// JSON output could not be produced.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_is_transparent() {
        let err = CliError::from(VigenzaError::NormNotFound("legge:1991;14~art9".to_string()));
        assert_eq!(err.to_string(), "Norm not found: legge:1991;14~art9");
    }
}

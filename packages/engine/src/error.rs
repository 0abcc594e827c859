//! Error types for the Vigenza engine

use thiserror::Error;

/// Main error type for engine operations.
///
/// Every variant except the I/O and serialization wrappers is recoverable at
/// batch level: the service turns them into anomalies instead of aborting.
#[derive(Error, Debug)]
pub enum VigenzaError {
    /// Destination text could not be parsed into a reference
    #[error("Unrecognized destination '{text}': {reason}")]
    ParseFailure { text: String, reason: String },

    /// Reference matches more than one node; caller must supply an act
    #[error("Ambiguous reference '{reference}': matches {}", candidates.join(", "))]
    AmbiguousReference {
        reference: String,
        candidates: Vec<String>,
    },

    /// Reference names an act or article that cannot be bound
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// Clause verb not recognized
    #[error("Unclassified amendment: {0}")]
    UnclassifiedAmendment(String),

    /// Amendment chain revisits a node
    #[error("Cyclic amendment chain: {}", path.join(" -> "))]
    CyclicAmendmentChain { path: Vec<String> },

    /// Concurrent upsert changed the node between read and commit
    #[error("Store conflict on {norm_id}: expected version {expected:?}, found {found:?}")]
    StoreConflict {
        norm_id: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    /// Norm not present in the graph
    #[error("Norm not found: {0}")]
    NormNotFound(String),

    /// Identifier text is not a valid act or norm identifier
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Invalid date format
    #[error("Invalid date format: '{0}'. Expected YYYY-MM-DD (e.g., 2021-06-01)")]
    InvalidDate(String),

    /// Batch file rejected before parsing
    #[error("Failed to load batch: {0}")]
    LoadError(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, VigenzaError>;

//! Error types for the multigsea library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum GseaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unique_by = '{0}' is not supported yet, only 'none' is")]
    UnsupportedUniqueBy(String),

    #[error("Gene set not found: {collection}/{name}")]
    UnknownGeneSet { collection: String, name: String },

    #[error("Collections not found: {}", .0.join(", "))]
    MissingCollections(Vec<String>),

    #[error("None of the feature identifiers in the GeneSetDb match the target rows")]
    EmptyMatch,

    #[error("Gene set {collection}/{name} is inactive; query with active_only = false")]
    InactiveGeneSet { collection: String, name: String },

    #[error("No '{key}' metadata registered for collection '{collection}'")]
    UnregisteredMetadata { collection: String, key: String },

    #[error("GeneSetDb is not conformed to a target: {0}")]
    NotConformed(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Scoring backend '{method}' failed: {reason}")]
    Backend { method: String, reason: String },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, GseaError>;

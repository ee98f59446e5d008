//! Error types for schema compilation and extraction

use thiserror::Error;

use crate::grammar::RuleId;

/// Result type for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Extraction errors
///
/// Nothing here is retried internally. Each variant carries enough context
/// (the offending type, the record, or the unparsed text) to diagnose the
/// failure without running generation again.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported type {type_name}: {reason}")]
    UnsupportedType { type_name: String, reason: String },

    #[error("Record {record} requires itself through required fields and has no finite instance")]
    UnboundedRecursion { record: String },

    #[error("Pre-filled field {field} is not a top-level field of the schema")]
    PrefillMismatch { field: String },

    #[error("Marker {marker:?} not found in engine transcript")]
    MarkerNotFound { marker: String },

    #[error("Generated document is not valid YAML: {source}\n--- document ---\n{text}")]
    ParseFailure {
        text: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Cannot construct value at {path}: {message}")]
    ConstructionFailure { path: String, message: String },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Unknown grammar rule {0}")]
    UnknownRule(RuleId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl ExtractError {
    pub(crate) fn unsupported(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

//! Error types for anfis

use thiserror::Error;

/// Result type for anfis operations
pub type Result<T> = std::result::Result<T, AnfisError>;

/// anfis error types
#[derive(Error, Debug)]
pub enum AnfisError {
    #[error("Invalid set count: a variable needs at least 2 fuzzy sets, got {0}")]
    InvalidSetCount(usize),

    #[error("Invalid universe of discourse: low ({low}) must be finite and below high ({high})")]
    InvalidUniverse { low: f64, high: f64 },

    #[error("Rule count mismatch: consequent declares {declared} rules, antecedents produce {product}")]
    RuleCountMismatch { declared: usize, product: usize },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Missing parameter in snapshot: {0}")]
    MissingParameter(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl AnfisError {
    /// Shape mismatch from anything printable.
    pub(crate) fn shape(expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> Self {
        AnfisError::ShapeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<std::io::Error> for AnfisError {
    fn from(err: std::io::Error) -> Self {
        AnfisError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AnfisError {
    fn from(err: serde_json::Error) -> Self {
        AnfisError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for AnfisError {
    fn from(err: toml::de::Error) -> Self {
        AnfisError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for AnfisError {
    fn from(err: toml::ser::Error) -> Self {
        AnfisError::Serialization(err.to_string())
    }
}

//! Error types for job configuration.

use thiserror::Error;

/// A translation request that cannot be turned into an engine job.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JobConfigError {
    #[error("unknown translation service '{0}'")]
    UnknownService(String),

    #[error("unknown language '{0}'")]
    UnknownLanguage(String),

    #[error("invalid page selection '{input}': {reason}")]
    InvalidPages { input: String, reason: String },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("at least one of mono or dual output must be produced")]
    NoOutputs,
}

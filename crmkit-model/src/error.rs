//! Error types for the record model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while reading typed values out of records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A value exists but has a different type than requested.
    #[error("could not cast value of type '{found}' to the expected '{expected}' type")]
    InvalidCast {
        expected: &'static str,
        found: &'static str,
    },

    /// A typed projection was applied to a record of another entity type.
    #[error("record of type '{found}' cannot be projected to '{expected}'")]
    LogicalNameMismatch { expected: String, found: String },
}

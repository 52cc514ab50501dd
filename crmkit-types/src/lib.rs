//! Core type definitions for crmkit.
//!
//! This crate defines the small, platform-level primitives shared by every
//! other crate in the workspace:
//! - Record identifiers ([`RecordId`]), where the nil UUID means "no id"
//! - Pipeline messages ([`MessageName`]) and stages ([`ProcessingStage`])
//! - Option-set and money wrappers used as attribute values
//!
//! Record and parameter structures live in `crmkit-model`.

mod ids;
mod message;
mod option_set;
mod stage;

pub use ids::RecordId;
pub use message::MessageName;
pub use option_set::{Money, OptionSetEnum, OptionSetValue};
pub use stage::ProcessingStage;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, TypesError>;

/// Errors that can occur when parsing or converting primitive types.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error("invalid record id: {0}")]
    InvalidRecordId(#[from] uuid::Error),

    #[error("unknown message name: {0}")]
    UnknownMessage(String),

    #[error("unknown processing stage: {0}")]
    UnknownStage(i32),
}

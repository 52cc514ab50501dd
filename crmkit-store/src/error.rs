//! Record-store errors.

use crmkit_container::ContainerError;
use crmkit_model::ModelError;
use crmkit_types::RecordId;
use thiserror::Error;

/// Result type for record-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by the record store or the repository layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{logical_name} with id {id} does not exist")]
    NotFound { logical_name: String, id: RecordId },

    /// The caller lacks a privilege. Treated as a security failure upstream.
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("record store fault: {0}")]
    Fault(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("Cannot find entity logical name")]
    MissingLogicalName,

    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

impl StoreError {
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}

//! Error types for plugin execution.

use crmkit_container::ContainerError;
use crmkit_model::ModelError;
use crmkit_store::StoreError;
use thiserror::Error;

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Every way a dispatch pass can fail.
///
/// Business-rule failures ([`is_business_rule`](Self::is_business_rule)) are
/// meant to be shown to the end user; everything else is a fault.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Container wiring mistake. Never recovered.
    #[error("configuration error: {0}")]
    Container(#[from] ContainerError),

    /// A handler asked for data the event does not carry.
    #[error("{0}")]
    Precondition(String),

    /// One or more validation handlers reported a violation.
    #[error("{}", .violations.join("\n"))]
    ValidationFailed { violations: Vec<String> },

    /// Business-rule failure raised by a handler.
    #[error("{0}")]
    InvalidPluginExecution(String),

    /// The caller lacks a privilege.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// A security failure re-raised as a business-rule failure.
    #[error("Security Exception occured in plugin: {message} \n {detail}.")]
    Security { message: String, detail: String },

    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    #[error("parameter type mismatch: {0}")]
    ParameterType(#[from] ModelError),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl PluginError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidPluginExecution(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// True for failures that carry a user-facing business message.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::Precondition(_)
                | Self::ValidationFailed { .. }
                | Self::InvalidPluginExecution(_)
                | Self::Security { .. }
        )
    }

    /// True for raw privilege failures that still need re-wrapping.
    pub fn is_security(&self) -> bool {
        match self {
            Self::AccessDenied(_) => true,
            Self::Store(e) => e.is_access_denied(),
            _ => false,
        }
    }
}

//! Container configuration errors.

use thiserror::Error;

/// Result type for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Configuration errors raised while registering or resolving services.
///
/// None of these are recoverable at runtime; they indicate a wiring mistake.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("no registration or default implementation found for '{service}'")]
    Unresolvable { service: &'static str },

    #[error(
        "'{service}' has {} default implementations: {}",
        .candidates.len(),
        .candidates.join(", ")
    )]
    AmbiguousImplementation {
        service: &'static str,
        candidates: Vec<&'static str>,
    },

    #[error("'{implementation}' must expose exactly one constructor, found {count}")]
    ConstructorCount {
        implementation: &'static str,
        count: usize,
    },

    #[error("Could not resolve constructor parameter properly '{service}' - '{parameter}'")]
    ParameterBinding {
        service: &'static str,
        parameter: String,
    },

    #[error("failed to resolve parameter '{parameter}' of '{implementation}'")]
    Dependency {
        implementation: &'static str,
        parameter: String,
        #[source]
        source: Box<ContainerError>,
    },

    #[error("'{service}' is already registered")]
    DuplicateRegistration { service: &'static str },

    #[error("failed to construct '{implementation}': {message}")]
    Construction {
        implementation: &'static str,
        message: String,
    },

    #[error("container has been dropped")]
    Disposed,
}

impl ContainerError {
    /// Innermost error, unwrapping nested [`ContainerError::Dependency`] layers.
    pub fn root_cause(&self) -> &ContainerError {
        match self {
            Self::Dependency { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

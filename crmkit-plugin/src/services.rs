//! Domain services resolved through the pass container.

use crate::logging::TracingService;
use crate::PluginResult;
use crmkit_container::{Constructor, Container, Injectable, WeakContainer};
use crmkit_store::RepositoriesFactory;
use std::any::type_name;
use std::sync::Arc;
use tracing::trace;

/// Resolves services (registered or default implementations) from the
/// container of the current pass.
pub struct ServicesFactory {
    container: WeakContainer,
}

impl ServicesFactory {
    pub fn new(container: &Container) -> Self {
        Self {
            container: container.downgrade(),
        }
    }

    pub fn get<S: ?Sized + Send + Sync + 'static>(&self) -> PluginResult<Arc<S>> {
        trace!(service = type_name::<S>(), "Resolving service");
        Ok(self.container.upgrade()?.resolve::<S>()?)
    }
}

impl Injectable for ServicesFactory {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|deps| Ok(ServicesFactory::new(deps.container())))]
    }
}

/// Common constructor argument of domain services.
pub struct ServiceArgs {
    pub repositories: Arc<RepositoriesFactory>,
    pub services: Arc<ServicesFactory>,
    pub tracing: Arc<dyn TracingService>,
}

impl Injectable for ServiceArgs {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|deps| {
            Ok(ServiceArgs {
                repositories: deps.resolve_concrete::<RepositoriesFactory>("repositories")?,
                services: deps.resolve_concrete::<ServicesFactory>("services")?,
                tracing: deps.resolve::<dyn TracingService>("tracing")?,
            })
        })]
    }
}

//! Container-backed repository construction.

use crate::{EntityRepository, OrganizationService, OrganizationServiceFactory, RepositoryArgs, StoreResult};
use crmkit_container::{Constructor, Container, Injectable, Override, WeakContainer};
use crmkit_model::EarlyBound;
use crmkit_types::RecordId;
use std::sync::Arc;
use tracing::trace;

/// Builds repositories bound to a caller identity.
///
/// Custom repositories are resolved from the container with a typed
/// [`RepositoryArgs`] override; the args are resolved with a typed override
/// of the connection. Holds the container weakly so it can itself be
/// registered in that container.
pub struct RepositoriesFactory {
    container: WeakContainer,
    service_factory: Arc<dyn OrganizationServiceFactory>,
}

impl RepositoriesFactory {
    pub fn new(container: &Container, service_factory: Arc<dyn OrganizationServiceFactory>) -> Self {
        Self {
            container: container.downgrade(),
            service_factory,
        }
    }

    /// Repository `R` for the user the event runs as.
    pub fn get<R: ?Sized + Send + Sync + 'static>(&self) -> StoreResult<Arc<R>> {
        self.get_for::<R>(RecordId::empty())
    }

    /// Repository `R` acting as `caller`.
    pub fn get_for<R: ?Sized + Send + Sync + 'static>(&self, caller: RecordId) -> StoreResult<Arc<R>> {
        self.resolve::<R>(Some(caller))
    }

    /// Repository `R` acting as the system identity.
    pub fn get_system<R: ?Sized + Send + Sync + 'static>(&self) -> StoreResult<Arc<R>> {
        self.resolve::<R>(None)
    }

    /// Generic repository for `T` for the user the event runs as.
    pub fn base<T: EarlyBound>(&self) -> StoreResult<EntityRepository<T>> {
        Ok(EntityRepository::new(self.args(Some(RecordId::empty()))?))
    }

    /// Generic repository for `T` acting as the system identity.
    pub fn system_base<T: EarlyBound>(&self) -> StoreResult<EntityRepository<T>> {
        Ok(EntityRepository::new(self.args(None)?))
    }

    fn resolve<R: ?Sized + Send + Sync + 'static>(&self, user_id: Option<RecordId>) -> StoreResult<Arc<R>> {
        let args = self.args(user_id)?;
        let container = self.container.upgrade()?;
        trace!(repository = std::any::type_name::<R>(), system = user_id.is_none(), "Resolving repository");
        Ok(container.resolve_with::<R>(&[Override::typed(args)])?)
    }

    fn args(&self, user_id: Option<RecordId>) -> StoreResult<Arc<RepositoryArgs>> {
        let service = self.service_factory.create_service(user_id);
        let container = self.container.upgrade()?;
        Ok(container.resolve_concrete::<RepositoryArgs>(&[Override::typed::<dyn OrganizationService>(service)])?)
    }
}

impl Injectable for RepositoriesFactory {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|deps| {
            Ok(RepositoriesFactory::new(
                deps.container(),
                deps.resolve::<dyn OrganizationServiceFactory>("service_factory")?,
            ))
        })]
    }
}

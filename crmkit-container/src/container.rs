// Dependency injection container

use crate::catalog::{builder, Builder};
use crate::{ContainerError, ContainerResult, Dependencies, ImplementationCatalog, Injectable, Override};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};
use tracing::{debug, trace};

struct Registration<S: ?Sized> {
    kind: &'static str,
    build: Builder<S>,
}

struct Inner {
    registrations: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    catalog: Arc<ImplementationCatalog>,
}

/// The dependency injection container.
///
/// Cloning is cheap and clones share registrations.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    /// Creates a container backed by the process-wide catalog.
    pub fn new() -> Self {
        Self::with_catalog(ImplementationCatalog::global())
    }

    /// Creates a container backed by the given catalog.
    pub fn with_catalog(catalog: Arc<ImplementationCatalog>) -> Self {
        debug!("Creating new DI container");
        Self {
            inner: Arc::new(Inner {
                registrations: RwLock::new(HashMap::new()),
                catalog,
            }),
        }
    }

    pub fn catalog(&self) -> &Arc<ImplementationCatalog> {
        &self.inner.catalog
    }

    /// Registers a ready-made instance.
    pub fn register_instance<S>(&self, instance: Arc<S>) -> ContainerResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.insert::<S>("instance", builder(move |_, _| Ok(Arc::clone(&instance))))
    }

    /// Registers a factory invoked on every resolve.
    pub fn register_factory<S, F>(&self, factory: F) -> ContainerResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<S> + Send + Sync + 'static,
    {
        self.insert::<S>("factory", builder(move |_, _| Ok(factory())))
    }

    /// Registers a factory invoked once, on first resolve.
    pub fn register_singleton<S, F>(&self, factory: F) -> ContainerResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<S> + Send + Sync + 'static,
    {
        let cell: OnceLock<Arc<S>> = OnceLock::new();
        self.insert::<S>(
            "singleton",
            builder(move |_, _| Ok(Arc::clone(cell.get_or_init(&factory)))),
        )
    }

    /// Binds service `S` to implementation `I`, constructed on every resolve.
    pub fn register_implementation<S, I>(&self, upcast: fn(Arc<I>) -> Arc<S>) -> ContainerResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable,
    {
        self.insert::<S>(
            "implementation",
            builder(move |container, overrides| {
                container
                    .construct::<I>(overrides)
                    .map(|instance| upcast(Arc::new(instance)))
            }),
        )
    }

    fn insert<S>(&self, kind: &'static str, build: Builder<S>) -> ContainerResult<()>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let service = type_name::<S>();
        trace!(service, "Acquiring write lock for registration");
        let mut registrations = self
            .inner
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if registrations.contains_key(&TypeId::of::<S>()) {
            return Err(ContainerError::DuplicateRegistration { service });
        }
        registrations.insert(TypeId::of::<S>(), Arc::new(Registration { kind, build }));

        debug!(service, kind, "Service registered in DI container");
        Ok(())
    }

    /// Check if a service is registered
    pub fn is_registered<S: ?Sized + 'static>(&self) -> bool {
        self.inner
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&TypeId::of::<S>())
    }

    fn registration<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<Registration<S>>> {
        let registrations = self
            .inner
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        registrations
            .get(&TypeId::of::<S>())
            .cloned()
            .and_then(|entry| entry.downcast::<Registration<S>>().ok())
    }

    /// Resolves a service.
    pub fn resolve<S: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Arc<S>> {
        self.resolve_with::<S>(&[])
    }

    /// Resolves a service, replacing constructor parameters with `overrides`.
    ///
    /// Uses the registration for `S` when one exists, otherwise the single
    /// default implementation from the catalog.
    pub fn resolve_with<S: ?Sized + Send + Sync + 'static>(&self, overrides: &[Override]) -> ContainerResult<Arc<S>> {
        let service = type_name::<S>();

        if let Some(registration) = self.registration::<S>() {
            trace!(service, kind = registration.kind, "Resolving from registration");
            return (registration.build)(self, overrides);
        }

        match self.inner.catalog.lookup::<S>()? {
            Some(build) => {
                trace!(service, "Resolving from default implementation");
                build(self, overrides)
            }
            None => {
                debug!(service, "Service not found in container");
                Err(ContainerError::Unresolvable { service })
            }
        }
    }

    /// Resolves a concrete type: the registration for `I` when one exists,
    /// otherwise a freshly constructed instance.
    pub fn resolve_concrete<I: Injectable>(&self, overrides: &[Override]) -> ContainerResult<Arc<I>> {
        if let Some(registration) = self.registration::<I>() {
            trace!(service = type_name::<I>(), kind = registration.kind, "Resolving from registration");
            return (registration.build)(self, overrides);
        }
        self.construct::<I>(overrides).map(Arc::new)
    }

    /// Builds `I` through its single constructor.
    pub fn construct<I: Injectable>(&self, overrides: &[Override]) -> ContainerResult<I> {
        let implementation = type_name::<I>();
        let constructors = I::constructors();

        let [constructor] = constructors.as_slice() else {
            return Err(ContainerError::ConstructorCount {
                implementation,
                count: constructors.len(),
            });
        };

        trace!(implementation, overrides = overrides.len(), "Constructing implementation");
        constructor.invoke(&Dependencies::new(self, overrides, implementation))
    }

    /// Non-owning handle, for services that must reach the container they
    /// are registered in.
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Clear all registrations
    pub fn clear(&self) {
        let mut registrations = self
            .inner
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let count = registrations.len();
        registrations.clear();

        debug!(registration_count = count, "Cleared all registrations from container");
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .inner
            .registrations
            .read()
            .map_or(0, |r| r.len());
        f.debug_struct("Container").field("registrations", &count).finish()
    }
}

/// Weak handle to a [`Container`].
#[derive(Clone, Debug)]
pub struct WeakContainer {
    inner: Weak<Inner>,
}

impl WeakContainer {
    pub fn upgrade(&self) -> ContainerResult<Container> {
        self.inner
            .upgrade()
            .map(|inner| Container { inner })
            .ok_or(ContainerError::Disposed)
    }
}

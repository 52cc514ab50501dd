//! Default implementations for service types without a registration.
//!
//! The embedding application lists, at startup, which concrete types
//! implement which services. When a container is asked for a service it has
//! no registration for, it falls back to the catalog. Exactly one candidate
//! must exist; the chosen candidate is memoized per service type.

use crate::{Container, ContainerError, ContainerResult, Injectable, Override};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use tracing::{debug, trace};

pub(crate) type Builder<S> =
    Arc<dyn Fn(&Container, &[Override]) -> ContainerResult<Arc<S>> + Send + Sync>;

pub(crate) fn builder<S, F>(build: F) -> Builder<S>
where
    S: ?Sized,
    F: Fn(&Container, &[Override]) -> ContainerResult<Arc<S>> + Send + Sync + 'static,
{
    Arc::new(build)
}

struct Candidate<S: ?Sized> {
    build: Builder<S>,
}

/// A memoized choice, with the implementation name for inspection.
struct Chosen {
    implementation_name: &'static str,
    candidate: Arc<dyn Any + Send + Sync>,
}

struct CatalogEntry {
    implementation: TypeId,
    implementation_name: &'static str,
    /// A `Candidate<S>` for the service type this entry is filed under.
    candidate: Arc<dyn Any + Send + Sync>,
}

static GLOBAL: LazyLock<Arc<ImplementationCatalog>> =
    LazyLock::new(|| Arc::new(ImplementationCatalog::new()));

/// Process-wide mapping from service type to its default implementations.
#[derive(Default)]
pub struct ImplementationCatalog {
    entries: RwLock<HashMap<TypeId, Vec<CatalogEntry>>>,
    resolved: RwLock<HashMap<TypeId, Chosen>>,
}

impl ImplementationCatalog {
    /// Creates an empty, standalone catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide catalog used by [`Container::new`].
    pub fn global() -> Arc<ImplementationCatalog> {
        Arc::clone(&GLOBAL)
    }

    /// Declares `I` as an implementation of `S`.
    ///
    /// Providing the same implementation twice is a no-op. Any memoized
    /// choice for `S` is discarded.
    pub fn provide<S, I>(&self, upcast: fn(Arc<I>) -> Arc<S>)
    where
        S: ?Sized + Send + Sync + 'static,
        I: Injectable,
    {
        let service = TypeId::of::<S>();
        let build = builder(move |container, overrides| {
            container
                .construct::<I>(overrides)
                .map(|instance| upcast(Arc::new(instance)))
        });

        {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            let list = entries.entry(service).or_default();
            if list.iter().any(|e| e.implementation == TypeId::of::<I>()) {
                return;
            }
            list.push(CatalogEntry {
                implementation: TypeId::of::<I>(),
                implementation_name: type_name::<I>(),
                candidate: Arc::new(Candidate { build }),
            });
        }
        self.resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&service);

        debug!(
            service = type_name::<S>(),
            implementation = type_name::<I>(),
            "Default implementation provided"
        );
    }

    /// Number of implementations declared for `S`.
    pub fn candidate_count<S: ?Sized + 'static>(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<S>())
            .map_or(0, Vec::len)
    }

    /// Type name of the implementation memoized for `S`, if a lookup has
    /// settled on one since the last [`provide`](Self::provide) for `S`.
    pub fn chosen<S: ?Sized + 'static>(&self) -> Option<&'static str> {
        self.resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<S>())
            .map(|chosen| chosen.implementation_name)
    }

    /// Builder of the single implementation of `S`, `None` when there is
    /// none, or an error when there are several.
    pub(crate) fn lookup<S: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Option<Builder<S>>> {
        let service = TypeId::of::<S>();

        if let Some(found) = self.memoized::<S>() {
            trace!(service = type_name::<S>(), "Default implementation memo hit");
            return Ok(Some(found));
        }

        let chosen = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&service).map(Vec::as_slice) {
                None | Some([]) => return Ok(None),
                Some([single]) => Chosen {
                    implementation_name: single.implementation_name,
                    candidate: Arc::clone(&single.candidate),
                },
                Some(many) => {
                    return Err(ContainerError::AmbiguousImplementation {
                        service: type_name::<S>(),
                        candidates: many.iter().map(|e| e.implementation_name).collect(),
                    });
                }
            }
        };

        let mut resolved = self.resolved.write().unwrap_or_else(PoisonError::into_inner);
        let winner = resolved.entry(service).or_insert(chosen);
        Ok(Arc::clone(&winner.candidate)
            .downcast::<Candidate<S>>()
            .ok()
            .map(|c| Arc::clone(&c.build)))
    }

    fn memoized<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Builder<S>> {
        let resolved = self.resolved.read().unwrap_or_else(PoisonError::into_inner);
        let chosen = resolved.get(&TypeId::of::<S>())?;
        Arc::clone(&chosen.candidate)
            .downcast::<Candidate<S>>()
            .ok()
            .map(|c| Arc::clone(&c.build))
    }
}

//! Constructor parameters and per-call overrides.

use crate::{Container, ContainerError, ContainerResult};
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;
use tracing::trace;

/// A type the container can build from its dependencies.
///
/// Implementors list their constructors; the container refuses types with
/// anything other than exactly one.
///
/// ```ignore
/// impl Injectable for AccountRepository {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(|deps| Ok(Self { args: deps.resolve_concrete("args")? }))]
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    fn constructors() -> Vec<Constructor<Self>>;
}

type ConstructorFn<I> = fn(&Dependencies<'_>) -> ContainerResult<I>;

/// One constructor of an [`Injectable`] type.
pub struct Constructor<I> {
    build: ConstructorFn<I>,
}

impl<I> Constructor<I> {
    pub fn new(build: ConstructorFn<I>) -> Self {
        Self { build }
    }

    pub(crate) fn invoke(&self, deps: &Dependencies<'_>) -> ContainerResult<I> {
        (self.build)(deps)
    }
}

#[derive(Clone, Debug)]
enum Matcher {
    /// Matches a parameter by name, ignoring case.
    Named(String),
    /// Matches any parameter whose declared service type equals the override's.
    Typed,
}

/// A pre-built value that replaces one constructor parameter during a
/// single resolve call.
#[derive(Clone)]
pub struct Override {
    matcher: Matcher,
    service: TypeId,
    service_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl Override {
    /// Overrides the parameter called `name` (case-insensitive).
    pub fn named<S: ?Sized + Send + Sync + 'static>(name: impl Into<String>, value: Arc<S>) -> Self {
        Self::build(Matcher::Named(name.into()), value)
    }

    /// Overrides every parameter whose service type is `S`.
    pub fn typed<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Self {
        Self::build(Matcher::Typed, value)
    }

    fn build<S: ?Sized + Send + Sync + 'static>(matcher: Matcher, value: Arc<S>) -> Self {
        Self {
            matcher,
            service: TypeId::of::<S>(),
            service_name: type_name::<S>(),
            value: Arc::new(value),
        }
    }

    fn is_valid(&self, service: TypeId, parameter: &str) -> bool {
        match &self.matcher {
            Matcher::Named(name) => name.eq_ignore_ascii_case(parameter),
            Matcher::Typed => self.service == service,
        }
    }

    fn value<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        self.value.downcast_ref::<Arc<S>>().cloned()
    }
}

impl std::fmt::Debug for Override {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Override")
            .field("matcher", &self.matcher)
            .field("service", &self.service_name)
            .finish()
    }
}

/// Parameter source handed to a [`Constructor`].
pub struct Dependencies<'a> {
    container: &'a Container,
    overrides: &'a [Override],
    implementation: &'static str,
}

impl<'a> Dependencies<'a> {
    pub(crate) fn new(
        container: &'a Container,
        overrides: &'a [Override],
        implementation: &'static str,
    ) -> Self {
        Self {
            container,
            overrides,
            implementation,
        }
    }

    /// Container the parameters are resolved from.
    pub fn container(&self) -> &Container {
        self.container
    }

    /// Resolves a service-typed parameter: an override when one applies,
    /// otherwise the container's registration or default implementation.
    pub fn resolve<S: ?Sized + Send + Sync + 'static>(&self, parameter: &str) -> ContainerResult<Arc<S>> {
        if let Some(value) = self.overridden::<S>(parameter)? {
            return Ok(value);
        }
        self.container
            .resolve::<S>()
            .map_err(|source| self.wrap(parameter, source))
    }

    /// Resolves a concrete-typed parameter: an override when one applies,
    /// otherwise a registration for `I`, otherwise direct construction.
    pub fn resolve_concrete<I: Injectable>(&self, parameter: &str) -> ContainerResult<Arc<I>> {
        if let Some(value) = self.overridden::<I>(parameter)? {
            return Ok(value);
        }
        self.container
            .resolve_concrete::<I>(&[])
            .map_err(|source| self.wrap(parameter, source))
    }

    fn overridden<S: ?Sized + Send + Sync + 'static>(&self, parameter: &str) -> ContainerResult<Option<Arc<S>>> {
        let service = TypeId::of::<S>();
        let mut matches = self.overrides.iter().filter(|o| o.is_valid(service, parameter));

        let Some(first) = matches.next() else {
            return Ok(None);
        };
        if matches.next().is_some() {
            return Err(self.binding_error::<S>(parameter));
        }

        trace!(
            implementation = self.implementation,
            parameter,
            service = first.service_name,
            "Using override for constructor parameter"
        );
        first
            .value::<S>()
            .map(Some)
            .ok_or_else(|| self.binding_error::<S>(parameter))
    }

    fn binding_error<S: ?Sized>(&self, parameter: &str) -> ContainerError {
        ContainerError::ParameterBinding {
            service: type_name::<S>(),
            parameter: parameter.to_string(),
        }
    }

    fn wrap(&self, parameter: &str, source: ContainerError) -> ContainerError {
        ContainerError::Dependency {
            implementation: self.implementation,
            parameter: parameter.to_string(),
            source: Box::new(source),
        }
    }
}

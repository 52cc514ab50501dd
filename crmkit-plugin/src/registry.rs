//! Ordered handler registrations of a plugin.

use crate::execution::{FromExecution, PluginExecution};
use crate::filter::HandlerFilter;
use crate::handler::{Handler, ValidationHandler, WorkHandler};
use crate::PluginResult;
use crmkit_container::Container;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Validation,
    Work,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => f.write_str("validation"),
            Self::Work => f.write_str("work"),
        }
    }
}

/// A handler built and bound to its execution view.
pub(crate) trait BoundHandler {
    fn can_work(&self) -> PluginResult<bool>;
}

pub(crate) trait BoundWork: BoundHandler {
    fn do_work(&self) -> PluginResult<()>;
}

pub(crate) trait BoundValidation: BoundHandler {
    fn is_valid(&self) -> PluginResult<bool>;

    fn violation_message(&self) -> String;
}

struct Bound<H: Handler> {
    handler: Arc<H>,
    execution: H::Execution,
}

impl<H: Handler> BoundHandler for Bound<H> {
    fn can_work(&self) -> PluginResult<bool> {
        self.handler.can_work(&self.execution)
    }
}

impl<H: WorkHandler> BoundWork for Bound<H> {
    fn do_work(&self) -> PluginResult<()> {
        self.handler.do_work(&self.execution)
    }
}

impl<H: ValidationHandler> BoundValidation for Bound<H> {
    fn is_valid(&self) -> PluginResult<bool> {
        self.handler.is_valid(&self.execution)
    }

    fn violation_message(&self) -> String {
        self.handler.violation_message()
    }
}

type WorkBinder = fn(&Container, PluginExecution) -> PluginResult<Box<dyn BoundWork>>;
type ValidationBinder = fn(&Container, PluginExecution) -> PluginResult<Box<dyn BoundValidation>>;

fn bind<H: Handler>(container: &Container, base: PluginExecution) -> PluginResult<Bound<H>> {
    let handler = container.resolve_concrete::<H>(&[])?;
    Ok(Bound {
        handler,
        execution: H::Execution::from_execution(base),
    })
}

fn bind_work<H: WorkHandler>(container: &Container, base: PluginExecution) -> PluginResult<Box<dyn BoundWork>> {
    Ok(Box::new(bind::<H>(container, base)?))
}

fn bind_validation<H: ValidationHandler>(
    container: &Container,
    base: PluginExecution,
) -> PluginResult<Box<dyn BoundValidation>> {
    Ok(Box::new(bind::<H>(container, base)?))
}

#[derive(Clone, Copy)]
enum Binder {
    Work(WorkBinder),
    Validation(ValidationBinder),
}

/// One entry of a [`HandlerRegistry`].
#[derive(Clone)]
pub struct HandlerRegistration {
    name: &'static str,
    filter: HandlerFilter,
    binder: Binder,
}

impl HandlerRegistration {
    /// Short type name of the handler.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> HandlerKind {
        match self.binder {
            Binder::Work(_) => HandlerKind::Work,
            Binder::Validation(_) => HandlerKind::Validation,
        }
    }

    pub fn filter(&self) -> &HandlerFilter {
        &self.filter
    }

    pub(crate) fn bind_work(&self, container: &Container, base: PluginExecution) -> Option<PluginResult<Box<dyn BoundWork>>> {
        match self.binder {
            Binder::Work(bind) => Some(bind(container, base)),
            Binder::Validation(_) => None,
        }
    }

    pub(crate) fn bind_validation(
        &self,
        container: &Container,
        base: PluginExecution,
    ) -> Option<PluginResult<Box<dyn BoundValidation>>> {
        match self.binder {
            Binder::Validation(bind) => Some(bind(container, base)),
            Binder::Work(_) => None,
        }
    }
}

impl fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("filter", &self.filter)
            .finish()
    }
}

/// Handlers of a plugin in execution order. Duplicates are kept.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    registrations: Vec<HandlerRegistration>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a work handler with its declared filter.
    pub fn work<H: WorkHandler>(&mut self) -> &mut Self {
        self.work_with_filter::<H>(H::filter())
    }

    /// Adds a work handler with a filter replacing its declared one.
    pub fn work_with_filter<H: WorkHandler>(&mut self, filter: HandlerFilter) -> &mut Self {
        self.push(short_type_name::<H>(), filter, Binder::Work(bind_work::<H>))
    }

    /// Adds a validation handler with its declared filter.
    pub fn validation<H: ValidationHandler>(&mut self) -> &mut Self {
        self.validation_with_filter::<H>(H::filter())
    }

    /// Adds a validation handler with a filter replacing its declared one.
    pub fn validation_with_filter<H: ValidationHandler>(&mut self, filter: HandlerFilter) -> &mut Self {
        self.push(short_type_name::<H>(), filter, Binder::Validation(bind_validation::<H>))
    }

    fn push(&mut self, name: &'static str, filter: HandlerFilter, binder: Binder) -> &mut Self {
        self.registrations.push(HandlerRegistration { name, filter, binder });
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &HandlerRegistration> {
        self.registrations.iter()
    }

    /// Registrations of one kind, in registration order.
    pub fn of_kind(&self, kind: HandlerKind) -> impl Iterator<Item = &HandlerRegistration> {
        self.registrations.iter().filter(move |r| r.kind() == kind)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.registrations.iter().map(HandlerRegistration::name).collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

/// `my_crate::handlers::Foo<Bar>` becomes `Foo<Bar>`.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let path_end = full.find('<').unwrap_or(full.len());
    match full[..path_end].rfind("::") {
        Some(index) => &full[index + 2..],
        None => full,
    }
}

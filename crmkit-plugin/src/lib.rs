//! Plugin execution engine for CRM record events.
//!
//! The host calls [`PluginPipeline::execute`] once per event. A pass then:
//!
//! 1. builds a fresh [`Container`](crmkit_container::Container) holding the
//!    event context, the host tracing sink, and cached store connections
//! 2. asks the [`Plugin`] to fill a [`HandlerRegistry`]
//! 3. runs every validation handler whose [`HandlerFilter`] matches, and
//!    aborts with one aggregated error if any reports a violation
//! 4. runs every matching work handler in registration order, aborting on
//!    the first failure
//!
//! Handlers see the event through execution views: [`PluginExecution`] for
//! raw parameters, [`EntityExecution`] for record events (images, merged
//! current state, change detection), [`DeleteExecution`], and
//! [`AssociationExecution`].

mod cache;
mod context;
mod dispatcher;
mod error;
mod execution;
mod filter;
mod handler;
mod logging;
mod pipeline;
mod registry;
mod services;
mod settings;

pub use cache::HandlerCache;
pub use context::{EventContext, ExecutionContext, HostServices, ServiceProvider};
pub use dispatcher::{DispatchPass, DispatchReport, PassState, SkipReason};
pub use error::{PluginError, PluginResult};
pub use execution::{
    AssociationExecution, DeleteExecution, EntityExecution, FromExecution, PluginExecution,
};
pub use filter::HandlerFilter;
pub use handler::{Handler, ValidationHandler, WorkHandler};
pub use logging::{
    LogLevel, RecordingTracingService, TracingService, TracingServiceLayer, subscriber_for,
};
pub use pipeline::{Plugin, PluginPipeline};
pub use registry::{HandlerKind, HandlerRegistration, HandlerRegistry};
pub use services::{ServiceArgs, ServicesFactory};
pub use settings::{LogSettings, PluginSettings};

/// Input parameter holding the record (or reference) the event is about.
pub const TARGET: &str = "Target";
/// Image name of the snapshot taken before the operation.
pub const PRE_IMAGE: &str = "PreImage";
/// Image name of the snapshot taken after the operation.
pub const POST_IMAGE: &str = "PostImage";
/// Input parameter holding the relationship of an associate event.
pub const RELATIONSHIP: &str = "Relationship";
/// Input parameter holding the related records of an associate event.
pub const RELATED_ENTITIES: &str = "RelatedEntities";

//! Host entry point: one `execute` call per event.

use crate::cache::HandlerCache;
use crate::context::{ExecutionContext, ServiceProvider};
use crate::dispatcher::{DispatchPass, DispatchReport};
use crate::execution::PluginExecution;
use crate::logging::{subscriber_for, TracingService};
use crate::registry::HandlerRegistry;
use crate::services::ServicesFactory;
use crate::settings::PluginSettings;
use crate::PluginResult;
use crmkit_container::{Container, ImplementationCatalog};
use crmkit_store::{
    CachedOrganizationServiceFactory, OrganizationService, OrganizationServiceFactory,
    RepositoriesFactory,
};
use crmkit_types::RecordId;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// A plugin: the handlers it runs and any extra services it needs.
pub trait Plugin: Send + Sync {
    /// Adds the plugin's handlers in execution order. Called once per event.
    fn register_handlers(&self, registry: &mut HandlerRegistry);

    /// Adds plugin-specific registrations to the pass container.
    fn configure(&self, _container: &Container) -> PluginResult<()> {
        Ok(())
    }
}

/// Runs a [`Plugin`] for host events.
///
/// Settings are read once, at construction. Record-store connections are
/// cached per caller for the lifetime of the pipeline and shared by every
/// pass, whichever thread it runs on.
pub struct PluginPipeline<P> {
    plugin: P,
    settings: PluginSettings,
    catalog: Arc<ImplementationCatalog>,
    connections: OnceLock<Arc<CachedOrganizationServiceFactory>>,
}

impl<P: Plugin> PluginPipeline<P> {
    /// `unsecure_config` is the step configuration; see [`PluginSettings::load`].
    pub fn new(plugin: P, unsecure_config: Option<&str>) -> Self {
        Self::with_catalog(plugin, unsecure_config, ImplementationCatalog::global())
    }

    pub fn with_catalog(plugin: P, unsecure_config: Option<&str>, catalog: Arc<ImplementationCatalog>) -> Self {
        Self {
            plugin,
            settings: PluginSettings::load(unsecure_config),
            catalog,
            connections: OnceLock::new(),
        }
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    /// Handles one event. Logging goes to the host's tracing sink, gated by
    /// the configured level, for the duration of the call.
    pub fn execute(&self, provider: &dyn ServiceProvider) -> PluginResult<()> {
        self.execute_with_report(provider).1
    }

    /// Like [`execute`](Self::execute), also returning what the pass did.
    pub fn execute_with_report(&self, provider: &dyn ServiceProvider) -> (DispatchReport, PluginResult<()>) {
        let subscriber = subscriber_for(provider.tracing_service(), self.settings.log_level());
        tracing::subscriber::with_default(subscriber, || self.run(provider))
    }

    fn run(&self, provider: &dyn ServiceProvider) -> (DispatchReport, PluginResult<()>) {
        let context = provider.execution_context();
        info!(
            message_name = context.message_name(),
            stage = context.stage(),
            depth = context.depth(),
            entity = context.primary_entity_name(),
            "Plugin execution started"
        );

        let container = match self.create_container(provider, Arc::clone(&context)) {
            Ok(container) => container,
            Err(e) => return (DispatchReport::default(), Err(e)),
        };
        let base = match self.base_execution(&container, context) {
            Ok(base) => base,
            Err(e) => return (DispatchReport::default(), Err(e)),
        };

        let mut registry = HandlerRegistry::new();
        self.plugin.register_handlers(&mut registry);
        debug!(handlers = registry.len(), "Handlers registered");

        let mut pass = DispatchPass::new(&registry, &container, base);
        let result = pass.run();
        debug!(state = ?pass.state(), "Dispatch pass finished");

        let report = pass.into_report();
        container.clear();
        (report, result)
    }

    fn base_execution(&self, container: &Container, context: Arc<dyn ExecutionContext>) -> PluginResult<PluginExecution> {
        Ok(PluginExecution::new(
            context,
            container.resolve_concrete::<RepositoriesFactory>(&[])?,
            container.resolve_concrete::<ServicesFactory>(&[])?,
            HandlerCache::new(),
        ))
    }

    fn create_container(&self, provider: &dyn ServiceProvider, context: Arc<dyn ExecutionContext>) -> PluginResult<Container> {
        let container = Container::with_catalog(Arc::clone(&self.catalog));
        let connections = Arc::clone(
            self.connections
                .get_or_init(|| Arc::new(CachedOrganizationServiceFactory::new(provider.organization_service_factory()))),
        );
        let factory: Arc<dyn OrganizationServiceFactory> = connections.clone();

        container.register_instance::<dyn OrganizationServiceFactory>(Arc::clone(&factory))?;
        container.register_instance::<dyn ExecutionContext>(context)?;
        container.register_instance::<dyn TracingService>(provider.tracing_service())?;
        container.register_instance(Arc::new(self.settings))?;
        container.register_factory::<dyn OrganizationService, _>(move || {
            connections.create_service(Some(RecordId::empty()))
        })?;
        container.register_instance(Arc::new(RepositoriesFactory::new(&container, factory)))?;
        container.register_instance(Arc::new(ServicesFactory::new(&container)))?;

        self.plugin.configure(&container)?;
        Ok(container)
    }
}

//! Host-side boundary: the raw execution context and service provider.

use crate::logging::TracingService;
use crate::{POST_IMAGE, PRE_IMAGE, TARGET};
use crmkit_model::{Entity, EntityImageCollection, ParameterCollection, Value};
use crmkit_store::OrganizationServiceFactory;
use crmkit_types::{MessageName, ProcessingStage, RecordId};
use std::sync::{Arc, PoisonError, RwLock};

/// The event as reported by the host.
///
/// The message name and stage are raw host values; they are parsed only
/// where a handler filter needs them.
pub trait ExecutionContext: Send + Sync {
    fn message_name(&self) -> &str;

    fn stage(&self) -> i32;

    /// Recursion depth of the pipeline; 1 for a user-initiated event.
    fn depth(&self) -> i32;

    fn primary_entity_name(&self) -> &str;

    fn user_id(&self) -> RecordId;

    fn initiating_user_id(&self) -> RecordId;

    fn input_parameter(&self, key: &str) -> Option<Value>;

    fn contains_input(&self, key: &str) -> bool;

    /// Inserts or overwrites an input parameter.
    fn set_input_parameter(&self, key: &str, value: Value);

    fn output_parameter(&self, key: &str) -> Option<Value>;

    /// Inserts or overwrites an output parameter.
    fn set_output_parameter(&self, key: &str, value: Value);

    fn pre_image(&self, name: &str) -> Option<Entity>;

    fn post_image(&self, name: &str) -> Option<Entity>;
}

/// In-process [`ExecutionContext`] built by hosts and tests.
#[derive(Debug, Default)]
pub struct EventContext {
    message_name: String,
    stage: i32,
    depth: i32,
    primary_entity_name: String,
    user_id: RecordId,
    initiating_user_id: RecordId,
    inputs: RwLock<ParameterCollection>,
    outputs: RwLock<ParameterCollection>,
    pre_images: EntityImageCollection,
    post_images: EntityImageCollection,
}

impl EventContext {
    /// Context with a raw message name and stage code.
    pub fn new(message_name: impl Into<String>, stage: i32) -> Self {
        Self {
            message_name: message_name.into(),
            stage,
            depth: 1,
            ..Self::default()
        }
    }

    pub fn for_message(message: MessageName, stage: ProcessingStage) -> Self {
        Self::new(message.as_str(), stage.code())
    }

    /// Sets the `Target` input and takes the primary entity name from it.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<Value>) -> Self {
        let target = target.into();
        match &target {
            Value::Entity(entity) => self.primary_entity_name = entity.logical_name.clone(),
            Value::EntityReference(reference) => {
                self.primary_entity_name = reference.logical_name.clone()
            }
            _ => {}
        }
        self.inputs_mut().insert(TARGET, target);
        self
    }

    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs_mut().insert(key, value);
        self
    }

    #[must_use]
    pub fn with_pre_image(mut self, image: Entity) -> Self {
        self.pre_images.insert(PRE_IMAGE, image);
        self
    }

    #[must_use]
    pub fn with_post_image(mut self, image: Entity) -> Self {
        self.post_images.insert(POST_IMAGE, image);
        self
    }

    #[must_use]
    pub fn with_named_pre_image(mut self, name: impl Into<String>, image: Entity) -> Self {
        self.pre_images.insert(name, image);
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: i32) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user_id: RecordId) -> Self {
        self.user_id = user_id;
        if self.initiating_user_id.is_empty() {
            self.initiating_user_id = user_id;
        }
        self
    }

    #[must_use]
    pub fn with_initiating_user(mut self, user_id: RecordId) -> Self {
        self.initiating_user_id = user_id;
        self
    }

    #[must_use]
    pub fn with_primary_entity_name(mut self, name: impl Into<String>) -> Self {
        self.primary_entity_name = name.into();
        self
    }

    /// Snapshot of the output parameters.
    pub fn outputs(&self) -> ParameterCollection {
        self.outputs.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn inputs_mut(&mut self) -> &mut ParameterCollection {
        self.inputs.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ExecutionContext for EventContext {
    fn message_name(&self) -> &str {
        &self.message_name
    }

    fn stage(&self) -> i32 {
        self.stage
    }

    fn depth(&self) -> i32 {
        self.depth
    }

    fn primary_entity_name(&self) -> &str {
        &self.primary_entity_name
    }

    fn user_id(&self) -> RecordId {
        self.user_id
    }

    fn initiating_user_id(&self) -> RecordId {
        self.initiating_user_id
    }

    fn input_parameter(&self, key: &str) -> Option<Value> {
        self.inputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn contains_input(&self, key: &str) -> bool {
        self.inputs.read().unwrap_or_else(PoisonError::into_inner).contains(key)
    }

    fn set_input_parameter(&self, key: &str, value: Value) {
        self.inputs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    fn output_parameter(&self, key: &str) -> Option<Value> {
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_output_parameter(&self, key: &str, value: Value) {
        self.outputs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    fn pre_image(&self, name: &str) -> Option<Entity> {
        self.pre_images.get(name).cloned()
    }

    fn post_image(&self, name: &str) -> Option<Entity> {
        self.post_images.get(name).cloned()
    }
}

/// Services the host makes available to one pipeline call.
pub trait ServiceProvider {
    fn execution_context(&self) -> Arc<dyn ExecutionContext>;

    fn tracing_service(&self) -> Arc<dyn TracingService>;

    fn organization_service_factory(&self) -> Arc<dyn OrganizationServiceFactory>;
}

/// Plain [`ServiceProvider`] over ready-made services.
#[derive(Clone)]
pub struct HostServices {
    pub context: Arc<dyn ExecutionContext>,
    pub tracing: Arc<dyn TracingService>,
    pub factory: Arc<dyn OrganizationServiceFactory>,
}

impl HostServices {
    pub fn new(
        context: Arc<dyn ExecutionContext>,
        tracing: Arc<dyn TracingService>,
        factory: Arc<dyn OrganizationServiceFactory>,
    ) -> Self {
        Self {
            context,
            tracing,
            factory,
        }
    }
}

impl ServiceProvider for HostServices {
    fn execution_context(&self) -> Arc<dyn ExecutionContext> {
        Arc::clone(&self.context)
    }

    fn tracing_service(&self) -> Arc<dyn TracingService> {
        Arc::clone(&self.tracing)
    }

    fn organization_service_factory(&self) -> Arc<dyn OrganizationServiceFactory> {
        Arc::clone(&self.factory)
    }
}

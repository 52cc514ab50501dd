//! Execution views handed to handlers.
//!
//! [`PluginExecution`] wraps the raw host context together with the
//! pass-scoped factories and cache. The typed views build on it and
//! memoize every projection they compute: each is read from the host at
//! most once per view, and an absent value is remembered as absent. A record
//! of another entity type is an error, remembered the same way.

use crate::cache::HandlerCache;
use crate::context::ExecutionContext;
use crate::services::ServicesFactory;
use crate::{PluginError, PluginResult, POST_IMAGE, PRE_IMAGE, RELATED_ENTITIES, RELATIONSHIP, TARGET};
use crmkit_model::{
    merge, EarlyBound, Entity, EntityReference, FromValue, ModelResult, Relationship, Value,
};
use crmkit_store::RepositoriesFactory;
use crmkit_types::{MessageName, ProcessingStage, RecordId};
use std::cell::OnceCell;
use std::sync::Arc;
use tracing::warn;

const PRE_IMAGE_REQUIRED: &str = "PreImage is required for update handlers.";
const CURRENT_STATE_REQUIRES_PRE_IMAGE: &str =
    "Cannot retrieve entity current state. PreImage does not exists";

/// Untyped view over the event plus the services of the current pass.
#[derive(Clone)]
pub struct PluginExecution {
    context: Arc<dyn ExecutionContext>,
    repositories: Arc<RepositoriesFactory>,
    services: Arc<ServicesFactory>,
    cache: HandlerCache,
}

impl PluginExecution {
    pub fn new(
        context: Arc<dyn ExecutionContext>,
        repositories: Arc<RepositoriesFactory>,
        services: Arc<ServicesFactory>,
        cache: HandlerCache,
    ) -> Self {
        Self {
            context,
            repositories,
            services,
            cache,
        }
    }

    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        &self.context
    }

    /// Typed input parameter. A missing (or null) parameter reads as
    /// `V::default()`; use [`contains_input_parameter`](Self::contains_input_parameter)
    /// to tell the two apart.
    pub fn get_input_parameter<V: FromValue + Default>(&self, key: &str) -> PluginResult<V> {
        read_parameter(self.context.input_parameter(key))
    }

    pub fn get_output_parameter<V: FromValue + Default>(&self, key: &str) -> PluginResult<V> {
        read_parameter(self.context.output_parameter(key))
    }

    /// Inserts or overwrites an input parameter.
    pub fn set_input_parameter(&self, key: &str, value: impl Into<Value>) {
        self.context.set_input_parameter(key, value.into());
    }

    /// Inserts or overwrites an output parameter.
    pub fn set_output_parameter(&self, key: &str, value: impl Into<Value>) {
        self.context.set_output_parameter(key, value.into());
    }

    pub fn contains_input_parameter(&self, key: &str) -> bool {
        self.context.contains_input(key)
    }

    pub fn is_message(&self, message: MessageName) -> bool {
        self.context.message_name() == message.as_str()
    }

    /// Compares against a raw message name, e.g. a custom action.
    pub fn is_message_name(&self, name: &str) -> bool {
        self.context.message_name() == name
    }

    pub fn is_stage(&self, stage: ProcessingStage) -> bool {
        self.context.stage() == stage.code()
    }

    /// Parsed message name; `None` for messages outside [`MessageName`].
    pub fn message(&self) -> Option<MessageName> {
        self.context.message_name().parse().ok()
    }

    pub fn depth(&self) -> i32 {
        self.context.depth()
    }

    pub fn user_id(&self) -> RecordId {
        self.context.user_id()
    }

    pub fn initiating_user_id(&self) -> RecordId {
        self.context.initiating_user_id()
    }

    pub fn primary_entity_name(&self) -> &str {
        self.context.primary_entity_name()
    }

    pub fn repositories(&self) -> &RepositoriesFactory {
        &self.repositories
    }

    pub fn services(&self) -> &ServicesFactory {
        &self.services
    }

    pub fn cache(&self) -> &HandlerCache {
        &self.cache
    }
}

impl std::fmt::Debug for PluginExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginExecution")
            .field("message", &self.context.message_name())
            .field("stage", &self.context.stage())
            .field("depth", &self.context.depth())
            .finish_non_exhaustive()
    }
}

fn read_parameter<V: FromValue + Default>(value: Option<Value>) -> PluginResult<V> {
    match value {
        None | Some(Value::Null) => Ok(V::default()),
        Some(value) => V::from_value(&value).ok_or_else(|| {
            PluginError::ParameterType(crmkit_model::ModelError::InvalidCast {
                expected: V::TYPE_NAME,
                found: value.kind(),
            })
        }),
    }
}

/// Builds a handler's view from the untyped execution.
pub trait FromExecution: Sized {
    fn from_execution(base: PluginExecution) -> Self;
}

impl FromExecution for PluginExecution {
    fn from_execution(base: PluginExecution) -> Self {
        base
    }
}

type Projection<T> = OnceCell<ModelResult<Option<T>>>;

fn project<T: EarlyBound>(entity: Option<Entity>, source: &str) -> ModelResult<Option<T>> {
    let Some(entity) = entity else {
        return Ok(None);
    };
    T::try_from_entity(entity).map(Some).inspect_err(|e| {
        warn!(source, error = %e, "Record does not match the handler entity type");
    })
}

fn lift<T>(projection: &ModelResult<Option<T>>) -> PluginResult<Option<&T>> {
    match projection {
        Ok(value) => Ok(value.as_ref()),
        Err(e) => Err(PluginError::ParameterType(e.clone())),
    }
}

fn merged<T: EarlyBound>(pre: &T, target: Option<&T>) -> Entity {
    match target {
        Some(target) => merge(pre.as_entity(), target.as_entity()),
        None => merge(pre.as_entity(), &Entity::default()),
    }
}

/// View for events whose `Target` is a record (create, update, ...).
pub struct EntityExecution<T> {
    base: PluginExecution,
    target: Projection<T>,
    pre_image: Projection<T>,
    post_image: Projection<T>,
    current_state: Projection<T>,
}

impl<T: EarlyBound> FromExecution for EntityExecution<T> {
    fn from_execution(base: PluginExecution) -> Self {
        Self {
            base,
            target: OnceCell::new(),
            pre_image: OnceCell::new(),
            post_image: OnceCell::new(),
            current_state: OnceCell::new(),
        }
    }
}

impl<T: EarlyBound> EntityExecution<T> {
    pub fn base(&self) -> &PluginExecution {
        &self.base
    }

    /// The `Target` input as `T`; `None` when absent or not a record.
    ///
    /// A `Target` record of another entity type is a
    /// [`PluginError::ParameterType`] error.
    pub fn target(&self) -> PluginResult<Option<&T>> {
        lift(self.target_projection())
    }

    pub fn pre_image(&self) -> PluginResult<Option<&T>> {
        lift(self.pre_image_projection())
    }

    pub fn post_image(&self) -> PluginResult<Option<&T>> {
        lift(self.post_image_projection())
    }

    /// Whether the event carries a `Target` input at all.
    pub fn target_exists(&self) -> bool {
        self.base.context.contains_input(TARGET)
    }

    pub fn pre_image_exists(&self) -> bool {
        self.base.context.pre_image(PRE_IMAGE).is_some()
    }

    pub fn post_image_exists(&self) -> bool {
        self.base.context.post_image(POST_IMAGE).is_some()
    }

    /// PreImage merged with Target. Fails when there is no PreImage.
    pub fn get_current_state(&self) -> PluginResult<T> {
        let pre = self
            .pre_image()?
            .ok_or_else(|| PluginError::precondition(CURRENT_STATE_REQUIRES_PRE_IMAGE))?;
        Ok(T::from_entity(merged(pre, self.target()?)))
    }

    /// Best available picture of the record: PreImage merged with Target,
    /// else PostImage, else Target.
    pub fn current_state(&self) -> PluginResult<Option<&T>> {
        lift(self.current_state.get_or_init(|| {
            let target = self.target_projection().as_ref().map_err(Clone::clone)?;
            if let Some(pre) = self.pre_image_projection().as_ref().map_err(Clone::clone)? {
                return Ok(Some(T::from_entity(merged(pre, target.as_ref()))));
            }
            let post = self.post_image_projection().as_ref().map_err(Clone::clone)?;
            Ok(post.as_ref().or(target.as_ref()).cloned())
        }))
    }

    fn target_projection(&self) -> &ModelResult<Option<T>> {
        self.target.get_or_init(|| {
            let entity = self
                .base
                .context
                .input_parameter(TARGET)
                .and_then(|value| Entity::from_value(&value));
            project(entity, TARGET)
        })
    }

    fn pre_image_projection(&self) -> &ModelResult<Option<T>> {
        self.pre_image
            .get_or_init(|| project(self.base.context.pre_image(PRE_IMAGE), PRE_IMAGE))
    }

    fn post_image_projection(&self) -> &ModelResult<Option<T>> {
        self.post_image
            .get_or_init(|| project(self.base.context.post_image(POST_IMAGE), POST_IMAGE))
    }

    /// Whether `field` changed in this event.
    ///
    /// Create: any value in Target counts. Update: the field is new relative
    /// to PreImage, or differs from it. Other messages never report a change.
    pub fn value_changed(&self, field: &str) -> PluginResult<bool> {
        let Some(target) = self.target()?.map(|record| record.as_entity()) else {
            return Ok(false);
        };
        if !target.contains(field) {
            return Ok(false);
        }

        if self.base.is_message(MessageName::Create) {
            return Ok(true);
        }
        if self.base.is_message(MessageName::Update) {
            let pre = self.require_pre_image()?;
            if !pre.contains(field) {
                return Ok(true);
            }
            return Ok(pre.value_or_null(field) != target.value_or_null(field));
        }
        Ok(false)
    }

    /// Whether `field` was set to `new_value` in this event. On update the
    /// PreImage must not already hold `new_value`.
    pub fn value_changed_to(&self, field: &str, new_value: impl Into<Value>) -> PluginResult<bool> {
        let is_create = self.base.is_message(MessageName::Create);
        let is_update = self.base.is_message(MessageName::Update);
        if !is_create && !is_update {
            return Ok(false);
        }
        let Some(target) = self.target()?.map(|record| record.as_entity()) else {
            return Ok(false);
        };

        let new_value = new_value.into().normalized();
        if target.value_or_null(field) != new_value {
            return Ok(false);
        }
        if is_create {
            return Ok(true);
        }

        let pre = self.require_pre_image()?;
        Ok(pre.value_or_null(field) != new_value)
    }

    /// Whether `field` moved exactly from `old_value` to `new_value` in an
    /// update. A field missing from PreImage counts as a change.
    pub fn value_changed_from_to(
        &self,
        field: &str,
        old_value: impl Into<Value>,
        new_value: impl Into<Value>,
    ) -> PluginResult<bool> {
        if !self.target_exists() || self.base.is_message(MessageName::Create) {
            return Ok(false);
        }
        let Some(target) = self.target()?.map(|record| record.as_entity()) else {
            return Ok(false);
        };
        if !target.contains(field) || !self.base.is_message(MessageName::Update) {
            return Ok(false);
        }

        let pre = self.require_pre_image()?;
        if !pre.contains(field) {
            return Ok(true);
        }
        Ok(pre.value_or_null(field) == old_value.into().normalized()
            && target.value_or_null(field) == new_value.into().normalized())
    }

    fn require_pre_image(&self) -> PluginResult<&Entity> {
        self.pre_image()?
            .map(|record| record.as_entity())
            .ok_or_else(|| PluginError::precondition(PRE_IMAGE_REQUIRED))
    }
}

/// View for delete events: Target is a reference, PreImage a record.
pub struct DeleteExecution<T> {
    base: PluginExecution,
    target: OnceCell<Option<EntityReference>>,
    pre_image: Projection<T>,
}

impl<T: EarlyBound> FromExecution for DeleteExecution<T> {
    fn from_execution(base: PluginExecution) -> Self {
        Self {
            base,
            target: OnceCell::new(),
            pre_image: OnceCell::new(),
        }
    }
}

impl<T: EarlyBound> DeleteExecution<T> {
    pub fn base(&self) -> &PluginExecution {
        &self.base
    }

    pub fn target(&self) -> Option<&EntityReference> {
        self.target
            .get_or_init(|| reference_input(&self.base, TARGET))
            .as_ref()
    }

    pub fn target_exists(&self) -> bool {
        self.base.context.contains_input(TARGET)
    }

    /// The PreImage as `T`; a record of another entity type is an error.
    pub fn pre_image(&self) -> PluginResult<Option<&T>> {
        lift(
            self.pre_image
                .get_or_init(|| project(self.base.context.pre_image(PRE_IMAGE), PRE_IMAGE)),
        )
    }

    pub fn pre_image_exists(&self) -> bool {
        self.base.context.pre_image(PRE_IMAGE).is_some()
    }
}

fn reference_input(base: &PluginExecution, key: &str) -> Option<EntityReference> {
    match base.context.input_parameter(key)? {
        Value::EntityReference(reference) => Some(reference),
        Value::Entity(entity) => Some(entity.to_entity_reference()),
        _ => None,
    }
}

/// View for associate and disassociate events.
pub struct AssociationExecution {
    base: PluginExecution,
    target: OnceCell<Option<EntityReference>>,
    relationship: OnceCell<Option<Relationship>>,
    related_entities: OnceCell<Vec<EntityReference>>,
}

impl FromExecution for AssociationExecution {
    fn from_execution(base: PluginExecution) -> Self {
        Self {
            base,
            target: OnceCell::new(),
            relationship: OnceCell::new(),
            related_entities: OnceCell::new(),
        }
    }
}

impl AssociationExecution {
    pub fn base(&self) -> &PluginExecution {
        &self.base
    }

    pub fn target(&self) -> Option<&EntityReference> {
        self.target
            .get_or_init(|| reference_input(&self.base, TARGET))
            .as_ref()
    }

    pub fn relationship(&self) -> Option<&Relationship> {
        self.relationship
            .get_or_init(|| {
                self.base
                    .context
                    .input_parameter(RELATIONSHIP)
                    .and_then(|value| Relationship::from_value(&value))
            })
            .as_ref()
    }

    /// Records on the other side of the relationship; empty when absent.
    pub fn related_entities(&self) -> &[EntityReference] {
        self.related_entities.get_or_init(|| {
            self.base
                .context
                .input_parameter(RELATED_ENTITIES)
                .and_then(|value| Vec::<EntityReference>::from_value(&value))
                .unwrap_or_default()
        })
    }

    /// True when the event concerns `schema_name`.
    pub fn is_relationship(&self, schema_name: &str) -> bool {
        self.relationship()
            .is_some_and(|relationship| relationship.schema_name == schema_name)
    }
}

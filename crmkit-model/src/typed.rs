//! Typed (early-bound) projections over dynamic records.

use crate::{Entity, ModelError, ModelResult};

/// A strongly typed record wrapper.
///
/// Implementors wrap an [`Entity`] of a single logical name. [`Entity`]
/// itself implements the trait with an empty logical name, meaning "any
/// entity type".
pub trait EarlyBound: Clone + Send + Sync + 'static {
    /// Logical name of the entity type, or empty for untyped records.
    const LOGICAL_NAME: &'static str;

    fn from_entity(entity: Entity) -> Self;

    fn as_entity(&self) -> &Entity;

    fn into_entity(self) -> Entity;

    /// Projects `entity`, rejecting records of another type.
    fn try_from_entity(entity: Entity) -> ModelResult<Self> {
        if !Self::LOGICAL_NAME.is_empty()
            && !entity.logical_name.is_empty()
            && entity.logical_name != Self::LOGICAL_NAME
        {
            return Err(ModelError::LogicalNameMismatch {
                expected: Self::LOGICAL_NAME.to_string(),
                found: entity.logical_name,
            });
        }
        Ok(Self::from_entity(entity))
    }
}

impl EarlyBound for Entity {
    const LOGICAL_NAME: &'static str = "";

    fn from_entity(entity: Entity) -> Self {
        entity
    }

    fn as_entity(&self) -> &Entity {
        self
    }

    fn into_entity(self) -> Entity {
        self
    }
}

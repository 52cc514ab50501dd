//! Records and record references.

use crate::{FromValue, ModelError, ModelResult, Value};
use crmkit_types::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// A record: entity logical name, id, and a sparse attribute map.
///
/// Attributes absent from the map were not supplied (for a target) or not
/// retrieved (for an image); this is different from an attribute present
/// with [`Value::Null`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub logical_name: String,
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub formatted_values: BTreeMap<String, String>,
}

impl Entity {
    /// Creates an empty record with no id.
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            ..Self::default()
        }
    }

    /// Creates an empty record with the given id.
    pub fn with_id(logical_name: impl Into<String>, id: RecordId) -> Self {
        Self {
            logical_name: logical_name.into(),
            id,
            ..Self::default()
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.attributes.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Attribute value with absent attributes read as [`Value::Null`] and
    /// enum values normalized.
    pub fn value_or_null(&self, field: &str) -> Value {
        self.attributes
            .get(field)
            .cloned()
            .unwrap_or_default()
            .normalized()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.attributes.remove(field)
    }

    /// Typed attribute read.
    ///
    /// Returns `Ok(None)` for absent or null attributes and an
    /// [`ModelError::InvalidCast`] when the stored value has another type.
    pub fn get_attribute_value<V: FromValue>(&self, field: &str) -> ModelResult<Option<V>> {
        match self.attributes.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => V::from_value(value)
                .map(Some)
                .ok_or(ModelError::InvalidCast {
                    expected: V::TYPE_NAME,
                    found: value.kind(),
                }),
        }
    }

    /// Formatted (display) value of an attribute, falling back to the raw
    /// value's text and finally to an empty string.
    pub fn formatted_value(&self, field: &str) -> String {
        if let Some(text) = self.formatted_values.get(field) {
            return text.clone();
        }
        self.attributes
            .get(field)
            .map(Value::display_text)
            .unwrap_or_default()
    }

    /// Reference to this record.
    pub fn to_entity_reference(&self) -> EntityReference {
        EntityReference::new(self.logical_name.clone(), self.id)
    }

    /// True when both records share logical name and a non-empty id.
    pub fn same_record(&self, other: &Entity) -> bool {
        !self.id.is_empty() && self.id == other.id && self.logical_name == other.logical_name
    }
}

/// Pointer to a record by logical name and id.
///
/// Equality and hashing ignore the display `name`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityReference {
    pub logical_name: String,
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EntityReference {
    pub fn new(logical_name: impl Into<String>, id: RecordId) -> Self {
        Self {
            logical_name: logical_name.into(),
            id,
            name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl PartialEq for EntityReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.logical_name == other.logical_name
    }
}

impl Eq for EntityReference {}

impl Hash for EntityReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.logical_name.hash(state);
        self.id.hash(state);
    }
}

/// Side of a self-referencing relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityRole {
    Referencing,
    Referenced,
}

/// Named relationship used by associate/disassociate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub schema_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_entity_role: Option<EntityRole>,
}

impl Relationship {
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            primary_entity_role: None,
        }
    }
}

//! Aliased values returned by linked-entity queries.
//!
//! A query that joins another entity under alias `a` returns the joined
//! columns as attributes named `a.field`, each wrapped in an
//! [`AliasedValue`] that remembers the source entity and attribute.

use crate::{Entity, FromValue, ModelError, ModelResult, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasedValue {
    pub entity_logical_name: String,
    pub attribute_logical_name: String,
    pub value: Value,
}

impl AliasedValue {
    pub fn new(
        entity_logical_name: impl Into<String>,
        attribute_logical_name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            entity_logical_name: entity_logical_name.into(),
            attribute_logical_name: attribute_logical_name.into(),
            value: value.into(),
        }
    }
}

fn aliased_key(alias: &str, field: &str) -> String {
    format!("{alias}.{field}")
}

impl Entity {
    /// Typed read of `alias.field`.
    ///
    /// Returns `Ok(None)` when the attribute is absent or its wrapped value is
    /// null. Option-set enums stored unnormalized are read as option sets.
    pub fn get_aliased_value<V: FromValue>(&self, alias: &str, field: &str) -> ModelResult<Option<V>> {
        let Some(raw) = self.get(&aliased_key(alias, field)) else {
            return Ok(None);
        };
        let inner = match raw {
            Value::Aliased(aliased) => aliased.value.clone(),
            other => other.clone(),
        }
        .normalized();

        if inner.is_null() {
            return Ok(None);
        }
        V::from_value(&inner)
            .map(Some)
            .ok_or(ModelError::InvalidCast {
                expected: V::TYPE_NAME,
                found: inner.kind(),
            })
    }

    /// Formatted value of `alias.field`, or an empty string.
    pub fn aliased_formatted_value(&self, alias: &str, field: &str) -> String {
        self.formatted_value(&aliased_key(alias, field))
    }

    /// Collects every `alias.*` attribute into a standalone record.
    ///
    /// The record's logical name comes from the first aliased value; its id
    /// is read from the `<logical_name>id` column when present. Returns
    /// `None` when no attribute carries the alias.
    pub fn extract_aliased(&self, alias: &str) -> Option<Entity> {
        let prefix = format!("{alias}.");
        let mut extracted: Option<Entity> = None;

        for (key, value) in &self.attributes {
            let Some(field) = key.strip_prefix(&prefix) else {
                continue;
            };
            let (logical_name, inner) = match value {
                Value::Aliased(aliased) => {
                    (aliased.entity_logical_name.as_str(), aliased.value.clone())
                }
                other => ("", other.clone()),
            };
            let record = extracted.get_or_insert_with(|| Entity::new(logical_name));
            if record.logical_name.is_empty() {
                record.logical_name = logical_name.to_string();
            }
            if let Some(text) = self.formatted_values.get(key) {
                record.formatted_values.insert(field.to_string(), text.clone());
            }
            record.attributes.insert(field.to_string(), inner);
        }

        if let Some(record) = extracted.as_mut() {
            let id_field = format!("{}id", record.logical_name);
            if let Some(Value::Guid(id)) = record.get(&id_field) {
                record.id = *id;
            }
        }
        extracted
    }
}

//! Keyed parameter and image bags supplied by the host.

use crate::{Entity, FromValue, ModelError, ModelResult, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input or output parameters of a pipeline message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterCollection(BTreeMap<String, Value>);

impl ParameterCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Inserts or overwrites a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Typed read. Absent and null parameters read as `Ok(None)`.
    pub fn get_as<V: FromValue>(&self, key: &str) -> ModelResult<Option<V>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => V::from_value(value)
                .map(Some)
                .ok_or(ModelError::InvalidCast {
                    expected: V::TYPE_NAME,
                    found: value.kind(),
                }),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ParameterCollection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Named record snapshots (pre/post images).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityImageCollection(BTreeMap<String, Entity>);

impl EntityImageCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, image: Entity) -> Option<Entity> {
        self.0.insert(name.into(), image)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

//! Attribute and parameter values.

use crate::{AliasedValue, Entity, EntityCollection, EntityReference, Relationship};
use chrono::{DateTime, Utc};
use crmkit_types::{Money, OptionSetEnum, OptionSetValue, RecordId};
use serde::{Deserialize, Serialize};

/// A value stored in a record attribute or passed as a pipeline parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    String(String),
    Integer(i32),
    BigInt(i64),
    Decimal(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Guid(RecordId),
    Money(Money),
    OptionSet(OptionSetValue),
    /// A strongly typed enum variant that has not been normalized to an
    /// [`OptionSetValue`] yet. Comparisons always go through [`Value::normalized`].
    Enum(i32),
    EntityReference(EntityReference),
    EntityReferenceCollection(Vec<EntityReference>),
    Entity(Box<Entity>),
    EntityCollection(EntityCollection),
    Relationship(Relationship),
    Aliased(Box<AliasedValue>),
}

impl Value {
    /// Wraps a strongly typed option-set enum.
    pub fn from_enum<E: OptionSetEnum>(value: E) -> Self {
        Self::Enum(value.option_value())
    }

    /// Converts enum values to their option-set representation; every other
    /// value is returned unchanged.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Enum(value) => Self::OptionSet(OptionSetValue(value)),
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type label used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::BigInt(_) => "bigint",
            Self::Decimal(_) => "decimal",
            Self::Boolean(_) => "boolean",
            Self::DateTime(_) => "datetime",
            Self::Guid(_) => "guid",
            Self::Money(_) => "money",
            Self::OptionSet(_) => "optionset",
            Self::Enum(_) => "enum",
            Self::EntityReference(_) => "entityreference",
            Self::EntityReferenceCollection(_) => "entityreferencecollection",
            Self::Entity(_) => "entity",
            Self::EntityCollection(_) => "entitycollection",
            Self::Relationship(_) => "relationship",
            Self::Aliased(_) => "aliasedvalue",
        }
    }

    /// Plain-text rendering used when no formatted value is available.
    pub fn display_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::String(s) => s.clone(),
            Self::Integer(v) => v.to_string(),
            Self::BigInt(v) => v.to_string(),
            Self::Decimal(v) => v.to_string(),
            Self::Boolean(v) => v.to_string(),
            Self::DateTime(v) => v.to_rfc3339(),
            Self::Guid(v) => v.to_string(),
            Self::Money(v) => v.amount().to_string(),
            Self::OptionSet(v) => v.to_string(),
            Self::Enum(v) => v.to_string(),
            Self::EntityReference(r) => r.name.clone().unwrap_or_else(|| r.id.to_string()),
            Self::Aliased(a) => a.value.display_text(),
            Self::EntityReferenceCollection(refs) => format!("{} references", refs.len()),
            Self::Entity(e) => format!("{}({})", e.logical_name, e.id),
            Self::EntityCollection(c) => format!("{} records", c.entities.len()),
            Self::Relationship(r) => r.schema_name.clone(),
        }
    }
}

/// Typed extraction of a [`Value`].
///
/// `from_value` returns `None` when the value holds a different type.
pub trait FromValue: Sized {
    /// Label used in cast errors.
    const TYPE_NAME: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident, $label:literal;)*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }

            impl FromValue for $ty {
                const TYPE_NAME: &'static str = $label;

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(inner) => Some(inner.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

value_conversions! {
    String => String, "string";
    i32 => Integer, "integer";
    i64 => BigInt, "bigint";
    f64 => Decimal, "decimal";
    bool => Boolean, "boolean";
    DateTime<Utc> => DateTime, "datetime";
    RecordId => Guid, "guid";
    Money => Money, "money";
    OptionSetValue => OptionSet, "optionset";
    EntityReference => EntityReference, "entityreference";
    Vec<EntityReference> => EntityReferenceCollection, "entityreferencecollection";
    EntityCollection => EntityCollection, "entitycollection";
    Relationship => Relationship, "relationship";
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Entity> for Value {
    fn from(value: Entity) -> Self {
        Value::Entity(Box::new(value))
    }
}

impl From<AliasedValue> for Value {
    fn from(value: AliasedValue) -> Self {
        Value::Aliased(Box::new(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "value";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for Entity {
    const TYPE_NAME: &'static str = "entity";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Entity(entity) => Some(entity.as_ref().clone()),
            _ => None,
        }
    }
}

impl FromValue for AliasedValue {
    const TYPE_NAME: &'static str = "aliasedvalue";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Aliased(aliased) => Some(aliased.as_ref().clone()),
            _ => None,
        }
    }
}

//! Query and request shapes exchanged with the record store.

use crate::{Entity, ParameterCollection, Value};
use serde::{Deserialize, Serialize};

/// Columns to retrieve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnSet {
    #[default]
    All,
    Columns(Vec<String>),
}

impl ColumnSet {
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Columns(columns.into_iter().map(Into::into).collect())
    }

    pub fn includes(&self, field: &str) -> bool {
        match self {
            Self::All => true,
            Self::Columns(columns) => columns.iter().any(|c| c == field),
        }
    }

    /// Copy of `record` limited to the selected columns.
    pub fn project(&self, record: &Entity) -> Entity {
        match self {
            Self::All => record.clone(),
            Self::Columns(columns) => {
                let mut projected = Entity::with_id(record.logical_name.clone(), record.id);
                for column in columns {
                    if let Some(value) = record.get(column) {
                        projected.attributes.insert(column.clone(), value.clone());
                    }
                    if let Some(text) = record.formatted_values.get(column) {
                        projected.formatted_values.insert(column.clone(), text.clone());
                    }
                }
                projected
            }
        }
    }
}

/// Page request for multi-record retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingInfo {
    /// 1-based page number.
    pub page_number: u32,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging_cookie: Option<String>,
}

impl PagingInfo {
    pub fn first_page(count: u32) -> Self {
        Self {
            page_number: 1,
            count,
            paging_cookie: None,
        }
    }
}

/// Equality query over one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryByAttribute {
    pub entity_name: String,
    pub conditions: Vec<(String, Value)>,
    pub column_set: ColumnSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<PagingInfo>,
}

impl QueryByAttribute {
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            conditions: Vec::new(),
            column_set: ColumnSet::All,
            top_count: None,
            page_info: None,
        }
    }

    #[must_use]
    pub fn with_condition(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into().normalized()));
        self
    }

    #[must_use]
    pub fn with_columns(mut self, column_set: ColumnSet) -> Self {
        self.column_set = column_set;
        self
    }

    #[must_use]
    pub fn with_top_count(mut self, top: u32) -> Self {
        self.top_count = Some(top);
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: PagingInfo) -> Self {
        self.page_info = Some(page);
        self
    }

    /// True when every condition matches the record's attribute value.
    pub fn matches(&self, record: &Entity) -> bool {
        record.logical_name == self.entity_name
            && self
                .conditions
                .iter()
                .all(|(field, expected)| record.value_or_null(field) == *expected)
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityCollection {
    pub entity_name: String,
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub more_records: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging_cookie: Option<String>,
}

/// A named request sent through the generic execute channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRequest {
    pub request_name: String,
    pub parameters: ParameterCollection,
}

impl OrganizationRequest {
    pub fn new(request_name: impl Into<String>) -> Self {
        Self {
            request_name: request_name.into(),
            parameters: ParameterCollection::new(),
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key, value);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationResponse {
    pub response_name: String,
    pub results: ParameterCollection,
}

//! Record model for crmkit.
//!
//! Defines the types that flow between the host, the plugin pipeline, and
//! the record store:
//! - [`Entity`]: one record with logical name, id, and a sparse attribute map
//! - [`Value`]: the attribute/parameter value union
//! - [`ParameterCollection`] / [`EntityImageCollection`]: the keyed bags the
//!   host hands to a plugin (input/output parameters, pre/post images)
//! - [`merge`]: field-wise record merge used to rebuild current state
//! - [`EarlyBound`]: typed projections over a dynamic [`Entity`]
//!
//! These types are consumed by the store, the container-backed repositories,
//! and the plugin execution views.

mod aliased;
mod entity;
mod error;
mod merge;
mod parameters;
mod query;
mod typed;
mod value;

pub use aliased::AliasedValue;
pub use entity::{Entity, EntityReference, EntityRole, Relationship};
pub use error::{ModelError, ModelResult};
pub use merge::merge;
pub use parameters::{EntityImageCollection, ParameterCollection};
pub use query::{
    ColumnSet, EntityCollection, OrganizationRequest, OrganizationResponse, PagingInfo,
    QueryByAttribute,
};
pub use typed::EarlyBound;
pub use value::{FromValue, Value};

//! Record-store boundary for crmkit.
//!
//! The host exposes its record store through [`OrganizationService`]
//! connections handed out by an [`OrganizationServiceFactory`]. This crate
//! layers on top of that:
//!
//! - [`CachedOrganizationServiceFactory`] memoizes one connection per caller
//! - [`RepositoryArgs`] / [`EntityRepository`] wrap common record operations
//! - [`RepositoriesFactory`] builds repositories through the container
//! - [`MemoryOrganizationService`] is an in-memory store for tests and hosts
//! - [`TraceScope`] logs entry, inputs, and elapsed time of an operation

mod error;
mod factory;
mod memory;
mod repository;
mod service;
mod trace;

pub use error::{StoreError, StoreResult};
pub use factory::RepositoriesFactory;
pub use memory::{Association, MemoryOrganizationService, MemoryServiceFactory, StoreCall};
pub use repository::{EntityRepository, Repository, RepositoryArgs, DEFAULT_PAGE_SIZE};
pub use service::{CachedOrganizationServiceFactory, OrganizationService, OrganizationServiceFactory};
pub use trace::TraceScope;

/// Attribute holding a record's state code.
pub const STATE_CODE: &str = "statecode";
/// Attribute holding a record's status reason.
pub const STATUS_CODE: &str = "statuscode";
/// Attribute holding a record's owner.
pub const OWNER_ID: &str = "ownerid";

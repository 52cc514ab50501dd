//! Dependency container for crmkit.
//!
//! A small resolver used to build handlers, repositories, and services:
//!
//! - explicit registrations (instance, factory, lazy singleton, or an
//!   implementation type bound to a service type)
//! - direct construction of concrete [`Injectable`] types
//! - a default-implementation [`ImplementationCatalog`] populated at startup,
//!   consulted when a service type has no registration
//! - per-call [`Override`]s that replace individual constructor parameters
//!
//! Every implementation declares exactly one constructor. Overrides apply
//! only to the constructor being filled, never to nested resolutions.

mod catalog;
mod container;
mod dependencies;
mod error;

pub use catalog::ImplementationCatalog;
pub use container::{Container, WeakContainer};
pub use dependencies::{Constructor, Dependencies, Injectable, Override};
pub use error::{ContainerError, ContainerResult};

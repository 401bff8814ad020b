//! # gru-catalog
//!
//! Declarative resource catalog executed by gru minions.
//!
//! A catalog is an ordered list of resource declarations. Running a catalog
//! reconciles each declared resource against the live system:
//!
//! - want present, currently absent → create
//! - want absent, currently present → delete
//! - present on both sides but outdated → update
//!
//! Resource types are registered explicitly at startup through
//! [`registry::register`]; the catalog resolves providers by type name at
//! run time and never introspects beyond the registry.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod registry;
pub mod resource;

pub use catalog::Catalog;
pub use registry::{register, register_builtin, RegistryItem};
pub use resource::{Resource, ResourceSpec, ResourceState, Sink};

/// The result type used throughout gru-catalog.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a catalog.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A declaration referenced a type with no registered provider.
    #[error("unknown resource type: {0}")]
    UnknownType(String),

    /// A provider was registered twice for the same type.
    #[error("resource type already registered: {0}")]
    AlreadyRegistered(String),

    /// A resource failed to evaluate or apply.
    #[error("resource {name} failed: {message}")]
    ResourceFailed {
        /// Name of the failing resource.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// Writing to the output sink failed.
    #[error("output sink error")]
    Sink(#[from] std::fmt::Error),
}

impl Error {
    /// Creates a resource failure error.
    #[must_use]
    pub fn resource_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceFailed {
            name: name.into(),
            message: message.into(),
        }
    }
}

//! Process-wide resource type registry.
//!
//! Providers are registered explicitly at startup and enumerated through
//! [`types`]; there is no dynamic discovery. Registration of a type that
//! already exists is an error so misconfigured setups fail loudly.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::resource::{NoopResource, Resource, ResourceSpec};
use crate::{Error, Result};

/// Provider function turning a declaration into a live resource.
pub type Provider = fn(&ResourceSpec) -> Result<Box<dyn Resource>>;

/// A registry entry binding a type name to its provider.
#[derive(Clone, Copy)]
pub struct RegistryItem {
    /// Resource type name used in catalog declarations.
    pub type_name: &'static str,
    /// Provider constructing resources of this type.
    pub provider: Provider,
}

impl std::fmt::Debug for RegistryItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryItem")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

static REGISTRY: Lazy<RwLock<BTreeMap<&'static str, RegistryItem>>> =
    Lazy::new(|| RwLock::new(BTreeMap::new()));

/// Registers a resource provider.
///
/// # Errors
///
/// Returns [`Error::AlreadyRegistered`] when the type name is taken.
pub fn register(item: RegistryItem) -> Result<()> {
    let mut registry = REGISTRY.write().unwrap_or_else(std::sync::PoisonError::into_inner);
    if registry.contains_key(item.type_name) {
        return Err(Error::AlreadyRegistered(item.type_name.to_string()));
    }
    registry.insert(item.type_name, item);
    Ok(())
}

/// Looks up the provider for a type name.
#[must_use]
pub fn provider(type_name: &str) -> Option<Provider> {
    let registry = REGISTRY.read().unwrap_or_else(std::sync::PoisonError::into_inner);
    registry.get(type_name).map(|item| item.provider)
}

/// Returns the registered type names in sorted order.
#[must_use]
pub fn types() -> Vec<&'static str> {
    let registry = REGISTRY.read().unwrap_or_else(std::sync::PoisonError::into_inner);
    registry.keys().copied().collect()
}

fn noop_provider(spec: &ResourceSpec) -> Result<Box<dyn Resource>> {
    Ok(Box::new(NoopResource::from_spec(spec)))
}

/// Registers the providers that ship with this crate.
///
/// Safe to call more than once; already-registered builtins are kept.
pub fn register_builtin() {
    let _ = register(RegistryItem {
        type_name: "noop",
        provider: noop_provider,
    });
}

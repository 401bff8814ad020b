//! Minion classification facts and their registry.
//!
//! A classifier is a named fact about the minion (operating system, CPU
//! architecture, site, rack…). The agent never interprets classifier
//! values; it only collects them and writes them to the store where the
//! controller can target minions by them.
//!
//! Classifier providers are registered explicitly at startup and enumerated
//! through [`keys`]; lookup failures are logged and skipped by the caller so
//! one broken provider never blocks the rest.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

use gru_core::error::{Error, Result};

/// A named fact about the minion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
    /// Fact identifier, e.g. `os`.
    pub key: String,
    /// Opaque fact payload.
    pub value: String,
}

impl Classifier {
    /// Creates a classifier fact.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Encodes the classifier for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] if the classifier cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::codec(e.to_string()))
    }

    /// Decodes a classifier from its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Codec`] on malformed input.
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| Error::codec(e.to_string()))
    }
}

/// Provider function producing the current value of a classifier.
pub type ClassifierFn = fn() -> Result<Classifier>;

static REGISTRY: Lazy<RwLock<BTreeMap<&'static str, ClassifierFn>>> =
    Lazy::new(|| RwLock::new(BTreeMap::new()));

/// Registers a classifier provider.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the key is already registered.
pub fn register(key: &'static str, provider: ClassifierFn) -> Result<()> {
    let mut registry = REGISTRY
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if registry.contains_key(key) {
        return Err(Error::InvalidInput(format!(
            "classifier already registered: {key}"
        )));
    }
    registry.insert(key, provider);
    Ok(())
}

/// Produces the current value of a registered classifier.
///
/// # Errors
///
/// Returns [`Error::NotFound`] for unregistered keys, or whatever the
/// provider itself fails with.
pub fn get(key: &str) -> Result<Classifier> {
    let provider = {
        let registry = REGISTRY
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        registry.get(key).copied()
    };
    provider.map_or_else(|| Err(Error::NotFound(format!("classifier: {key}"))), |f| f())
}

/// Returns the registered classifier keys in sorted order.
#[must_use]
pub fn keys() -> Vec<&'static str> {
    let registry = REGISTRY
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    registry.keys().copied().collect()
}

fn os_classifier() -> Result<Classifier> {
    Ok(Classifier::new("os", std::env::consts::OS))
}

fn arch_classifier() -> Result<Classifier> {
    Ok(Classifier::new("arch", std::env::consts::ARCH))
}

/// Registers the classifiers that ship with this crate.
///
/// Safe to call more than once; already-registered builtins are kept.
pub fn register_builtin() {
    let _ = register("os", os_classifier);
    let _ = register("arch", arch_classifier);
}

//! The catalog: an ordered list of resource declarations and its executor.

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::debug;

use crate::registry;
use crate::resource::{ResourceSpec, Sink};
use crate::{Error, Result};

/// An executable collection of resource declarations.
///
/// Catalogs travel inside task payloads as opaque data; the minion runs them
/// to completion and captures the sink output into the task result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Declarations in execution order.
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog from declarations.
    #[must_use]
    pub fn with_resources(resources: Vec<ResourceSpec>) -> Self {
        Self { resources }
    }

    /// Returns the number of declared resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true when the catalog declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Runs the catalog, reconciling each resource in declaration order.
    ///
    /// Progress lines are appended to `sink`. Execution stops at the first
    /// failing resource; everything written up to that point stays in the
    /// sink so the failure context survives in the task result.
    ///
    /// # Errors
    ///
    /// Returns the first provider lookup or reconciliation failure.
    pub async fn run(&self, sink: &mut Sink) -> Result<()> {
        for spec in &self.resources {
            let provider = registry::provider(&spec.type_name)
                .ok_or_else(|| Error::UnknownType(spec.type_name.clone()))?;
            let resource = provider(spec)?;

            debug!(resource = %spec.name, kind = %spec.type_name, "evaluating resource");
            let state = resource.evaluate().await.map_err(|e| {
                Error::resource_failed(&spec.name, e.to_string())
            })?;

            writeln!(
                sink,
                "{}[{}] current:{} want:{}",
                spec.type_name, spec.name, state.current, state.want
            )?;

            if state.wants_present() && !state.is_present() {
                resource.create(sink).await?;
            } else if !state.wants_present() && state.is_present() {
                resource.delete(sink).await?;
            } else if state.outdated {
                resource.update(sink).await?;
            }
        }

        Ok(())
    }
}

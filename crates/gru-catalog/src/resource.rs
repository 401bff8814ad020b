//! Resource declarations and the provider trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::Result;

/// Output sink resources write human-readable progress lines to.
///
/// `Send` so catalog execution can move between worker threads.
pub type Sink = dyn Write + Send;

/// States in which a resource is considered present on the system.
pub const PRESENT_STATES: &[&str] = &["present", "running"];

/// States in which a resource is considered absent from the system.
pub const ABSENT_STATES: &[&str] = &["absent", "stopped"];

/// A single resource declaration inside a catalog.
///
/// Declarations are pure data; the provider registered for `type_name`
/// turns them into live [`Resource`] instances at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Registered provider type, e.g. `noop` or `service`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Resource name, unique within its type.
    pub name: String,
    /// Desired state, e.g. `present` or `running`.
    #[serde(default = "default_state")]
    pub state: String,
    /// Provider-specific options.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

fn default_state() -> String {
    "present".to_string()
}

impl ResourceSpec {
    /// Creates a declaration with the default `present` state.
    #[must_use]
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            state: default_state(),
            options: BTreeMap::new(),
        }
    }
}

/// Result of evaluating a resource against the live system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    /// The state the resource is currently in.
    pub current: String,
    /// The state the declaration wants.
    pub want: String,
    /// True when the resource is present but its properties drifted.
    pub outdated: bool,
}

impl ResourceState {
    /// Returns true if the current state counts as present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        PRESENT_STATES.contains(&self.current.as_str())
    }

    /// Returns true if the wanted state counts as present.
    #[must_use]
    pub fn wants_present(&self) -> bool {
        PRESENT_STATES.contains(&self.want.as_str())
    }
}

/// A live resource that can be reconciled.
///
/// Implementations write human-readable progress lines to the sink; the
/// runner captures the sink into the task result.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource name, unique within its type.
    fn name(&self) -> &str;

    /// Registered type of this resource.
    fn type_name(&self) -> &str;

    /// Evaluates the current state of the resource.
    async fn evaluate(&self) -> Result<ResourceState>;

    /// Brings an absent resource into its present state.
    async fn create(&self, sink: &mut Sink) -> Result<()>;

    /// Removes a present resource.
    async fn delete(&self, sink: &mut Sink) -> Result<()>;

    /// Refreshes an outdated resource in place.
    async fn update(&self, sink: &mut Sink) -> Result<()>;
}

/// A resource that records state transitions without touching the system.
///
/// Useful for catalog dry runs and as the reference provider in tests.
#[derive(Debug, Clone)]
pub struct NoopResource {
    name: String,
    want: String,
}

impl NoopResource {
    /// Creates a noop resource from its declaration.
    #[must_use]
    pub fn from_spec(spec: &ResourceSpec) -> Self {
        Self {
            name: spec.name.clone(),
            want: spec.state.clone(),
        }
    }
}

#[async_trait]
impl Resource for NoopResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        "noop"
    }

    async fn evaluate(&self) -> Result<ResourceState> {
        // Always reports the wanted state, so reconciliation never acts.
        Ok(ResourceState {
            current: self.want.clone(),
            want: self.want.clone(),
            outdated: false,
        })
    }

    async fn create(&self, sink: &mut Sink) -> Result<()> {
        writeln!(sink, "noop[{}] create", self.name)?;
        Ok(())
    }

    async fn delete(&self, sink: &mut Sink) -> Result<()> {
        writeln!(sink, "noop[{}] delete", self.name)?;
        Ok(())
    }

    async fn update(&self, sink: &mut Sink) -> Result<()> {
        writeln!(sink, "noop[{}] update", self.name)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_defaults_to_present() {
        let spec: ResourceSpec =
            serde_json::from_str(r#"{"type": "noop", "name": "web"}"#).unwrap();
        assert_eq!(spec.state, "present");
        assert!(spec.options.is_empty());
    }

    #[test]
    fn state_classification() {
        let state = ResourceState {
            current: "stopped".into(),
            want: "running".into(),
            outdated: false,
        };
        assert!(!state.is_present());
        assert!(state.wants_present());
    }

    #[tokio::test]
    async fn noop_reports_wanted_state() {
        let resource = NoopResource::from_spec(&ResourceSpec::new("noop", "web"));
        let state = resource.evaluate().await.unwrap();
        assert_eq!(state.current, state.want);
        assert!(!state.outdated);
    }
}

//! Strongly-typed minion identifiers.
//!
//! Minion identifiers are:
//! - **Deterministic**: Derived from the minion name alone, so the controller
//!   and the minion agree on the identifier without consulting the store
//! - **Strongly typed**: A [`MinionId`] cannot be confused with a task id
//! - **Stable forever**: The derivation namespace is part of the public
//!   contract and never changes
//!
//! # Example
//!
//! ```rust
//! use gru_core::id::MinionId;
//!
//! let id = MinionId::derive("Kevin");
//! assert_eq!(id, MinionId::derive("Kevin"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// The namespace UUID used for name-based derivation.
///
/// This is the RFC 4122 DNS namespace (`6ba7b810-9dad-11d1-80b4-00c04fd430c8`).
/// It is part of the public contract between controller and minion and must
/// never change: `derive(name)` is byte-exact across releases.
pub const DERIVE_NAMESPACE: Uuid = Uuid::NAMESPACE_DNS;

/// A unique identifier for a minion.
///
/// Names are human labels and need not be unique; the identifier is the
/// UUIDv5 of the name under [`DERIVE_NAMESPACE`] and is what the key
/// namespace hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinionId(Uuid);

impl MinionId {
    /// Derives the identifier for a minion name.
    ///
    /// The derivation is a pure function of the name: the same name always
    /// yields the same identifier, on every host and in every release.
    #[must_use]
    pub fn derive(name: &str) -> Self {
        Self(Uuid::new_v5(&DERIVE_NAMESPACE, name.as_bytes()))
    }

    /// Creates a minion ID from a raw UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for MinionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MinionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s).map(Self).map_err(|e| {
            Error::InvalidInput(format!("invalid minion ID '{s}': {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(MinionId::derive("Kevin"), MinionId::derive("Kevin"));
    }

    #[test]
    fn derive_distinguishes_names() {
        assert_ne!(MinionId::derive("Kevin"), MinionId::derive("Bob"));
        assert_ne!(MinionId::derive("kevin"), MinionId::derive("Kevin"));
    }

    #[test]
    fn derive_is_version_5() {
        let id = MinionId::derive("Kevin");
        assert_eq!(id.as_uuid().get_version_num(), 5);
    }

    #[test]
    fn id_roundtrips_through_display() {
        let id = MinionId::derive("Kevin");
        let parsed: MinionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn invalid_id_returns_error() {
        let result: Result<MinionId> = "not-a-uuid".parse();
        assert!(result.is_err());
    }
}

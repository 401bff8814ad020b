//! Error types and result aliases for gru.
//!
//! This module defines the shared error types used across all gru components.
//! Errors are structured for programmatic handling: callers match on the kind
//! to decide between retrying, skipping, and aborting.

/// The result type used throughout gru.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gru operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The key-value store could not be reached or a watch broke.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested key or prefix does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A payload could not be decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of what made the payload undecodable.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new transport error with the given message.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new transport error with a source cause.
    #[must_use]
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new codec error with the given message.
    #[must_use]
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Returns true if this error means the key or prefix was absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display() {
        let err = Error::transport("connection refused");
        assert!(err.to_string().contains("transport error"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn transport_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = Error::transport_with_source("watch broken", source);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn not_found_is_not_found() {
        assert!(Error::NotFound("/gru/minion".into()).is_not_found());
        assert!(!Error::codec("bad payload").is_not_found());
    }
}

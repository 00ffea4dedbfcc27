// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

use std::{error::Error as StdError, time::Duration};

/// An error from a cache operation.
///
/// Storage-originated failures ([`Storage`](Error::Storage) and
/// [`Timeout`](Error::Timeout)) are transient: managers degrade them to a
/// cache miss on reads and log-and-continue on writes, so they rarely cross
/// the public surface. The remaining kinds are surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A storage operation failed (connection loss, backend error).
    #[error("storage operation failed: {0}")]
    Storage(#[source] Box<dyn StdError + Send + Sync>),

    /// A storage operation exceeded the configured operation timeout.
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// The caller-provided executor failed. Any held lock was released
    /// before this error propagated.
    #[error("executor failed: {0}")]
    Executor(#[source] Box<dyn StdError + Send + Sync>),

    /// No cached value was found and the configured fallback refused to
    /// produce one.
    #[error("no cached value for key {key:?}")]
    Miss {
        /// The key that missed.
        key: String,
    },

    /// Invalid construction or registration arguments.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A payload or envelope could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Creates a storage error wrapping a cause.
    pub fn storage(cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Storage(cause.into())
    }

    /// Creates an executor error wrapping a cause.
    pub fn executor(cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Executor(cause.into())
    }

    /// Creates a configuration error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true for failures that managers treat as a cache miss on
    /// reads and as best-effort on writes.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Timeout(_))
    }
}

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn storage_errors_are_transient() {
        let err = Error::storage(io::Error::new(io::ErrorKind::ConnectionRefused, "down"));
        assert!(err.is_transient());

        let err = Error::Timeout(Duration::from_millis(150));
        assert!(err.is_transient());
    }

    #[test]
    fn surfaced_errors_are_not_transient() {
        assert!(!Error::executor("boom").is_transient());
        assert!(!Error::config("bad factor").is_transient());
        assert!(!Error::Miss { key: "k".into() }.is_transient());
    }

    #[test]
    fn display_contains_cause_message() {
        let err = Error::storage("connection refused");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn source_preserves_original_type() {
        let err = Error::storage(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        let source = err.source().expect("should have a source");
        assert!(source.downcast_ref::<io::Error>().is_some());
    }
}

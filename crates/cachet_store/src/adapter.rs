// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The raw string interface every cache backend implements.
//!
//! [`StorageAdapter`] is the only seam a backend has to satisfy. Everything
//! above it (record envelopes, tag capture, staleness checks, timeouts) is
//! layered on by [`RecordStorage`](crate::RecordStorage), and the multi-level
//! tier path consumes adapters directly.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Connection state reported by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The backend is reachable.
    Connected,
    /// The backend is unreachable; operations will fail transiently.
    Disconnected,
}

/// Raw key/value operations over a single backend.
///
/// Values are opaque strings; TTLs are enforced by the backend. The lock
/// primitives are best-effort exclusive locks with a backend-provided TTL so
/// a crashed holder cannot wedge a key forever.
///
/// Only `get`, `set`, `del` and the lock primitives are required; the batch
/// operations have loop-based defaults that backends with native multi-key
/// support should override.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Gets the raw value stored at `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` at `key`, expiring after `ttl` if one is given.
    ///
    /// Returns true if the write was accepted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool>;

    /// Deletes the value at `key`. Returns true if a value was removed.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Gets multiple keys in one call, preserving order.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    /// Stores multiple key/value pairs, all with the same `ttl`.
    async fn mset(&self, pairs: &[(String, String)], ttl: Option<Duration>) -> Result<()> {
        for (key, value) in pairs {
            self.set(key, value, ttl).await?;
        }
        Ok(())
    }

    /// Attempts to take the exclusive lock for `key`.
    ///
    /// Returns true if this caller now holds the lock. The lock expires on
    /// its own after the backend's configured lock TTL.
    async fn acquire_lock(&self, key: &str) -> Result<bool>;

    /// Releases the lock for `key`. Returns true if a lock was held.
    async fn release_lock(&self, key: &str) -> Result<bool>;

    /// Returns true if the lock for `key` is currently held.
    async fn is_lock_exists(&self, key: &str) -> Result<bool>;

    /// Reports the backend's connection state.
    fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus::Connected
    }

    /// Registers a callback to run when the backend (re)connects.
    ///
    /// The default fires the callback immediately when the backend is
    /// already connected; adapters with real connection lifecycles should
    /// store it and fire it on every reconnect.
    fn on_connect(&self, callback: Box<dyn Fn() + Send + Sync>) {
        if self.connection_status() == ConnectionStatus::Connected {
            callback();
        }
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The record-discipline interface consumed by cache managers.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    adapter::ConnectionStatus,
    clock::Clock,
    error::Result,
    record::{Record, TagVersion},
    tags::TagSource,
};

/// Options for a record write.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// Lifetime of the record. Falls back to the storage's default TTL.
    pub expires_in: Option<Duration>,
    /// Disables time-based expiration for this record.
    pub permanent: bool,
    /// Tags to capture at write time.
    pub tags: TagSource,
}

impl WriteOptions {
    /// Creates options with no TTL override, no permanence and no tags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the record lifetime.
    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_in = Some(ttl);
        self
    }

    /// Marks the record permanent.
    #[must_use]
    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self
    }

    /// Sets the tags captured at write time.
    #[must_use]
    pub fn tags(mut self, tags: impl Into<TagSource>) -> Self {
        self.tags = tags.into();
        self
    }
}

/// Tunables for a record storage.
#[derive(Clone, Copy, Debug)]
pub struct StorageSettings {
    /// Bound for every single backend call. An expired wait is a transient
    /// failure: a miss for reads, a failed write for writes.
    pub operation_timeout: Duration,
    /// TTL of per-key lock records; also bounds how long a contending reader
    /// waits for another process's result.
    pub lock_expire: Duration,
    /// Lifetime applied when a write specifies neither `expires_in` nor
    /// `permanent`.
    pub default_ttl: Duration,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_millis(150),
            lock_expire: Duration::from_millis(20_000),
            default_ttl: Duration::from_secs(3_600),
        }
    }
}

/// Uniform record-level operations over any backend.
///
/// Managers speak this interface exclusively; backend specifics stay behind
/// [`StorageAdapter`](crate::StorageAdapter). Every method may fail
/// transiently — managers treat such failures as cache misses for reads and
/// as best-effort for writes.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the full record envelope stored at `key`, or `None`.
    async fn get(&self, key: &str) -> Result<Option<Record>>;

    /// Writes a record composed from the already-serialized `value` and the
    /// given options, capturing current tag versions. Returns the record
    /// actually written.
    async fn set(&self, key: &str, value: String, options: &WriteOptions) -> Result<Record>;

    /// Deletes the record at `key`. Returns true if one was removed.
    async fn del(&self, key: &str) -> Result<bool>;

    /// Advances every named tag's version to "now".
    async fn touch(&self, tags: &[String]) -> Result<()>;

    /// Snapshots current versions for the named tags, creating any missing
    /// tag at version "now".
    async fn get_tags(&self, names: &[String]) -> Result<Vec<TagVersion>>;

    /// Returns true iff any tag on the record has a current version
    /// strictly greater than the version the record captured.
    async fn is_outdated(&self, record: &Record) -> Result<bool>;

    /// Attempts to take the per-key recompute lock.
    async fn lock_key(&self, key: &str) -> Result<bool>;

    /// Releases the per-key recompute lock.
    async fn release_key(&self, key: &str) -> Result<bool>;

    /// Returns true if the per-key recompute lock is held.
    async fn key_is_locked(&self, key: &str) -> Result<bool>;

    /// Reports the backend's connection state.
    fn connection_status(&self) -> ConnectionStatus;

    /// The clock this storage stamps records and tag versions with.
    fn clock(&self) -> &Clock;

    /// The settings this storage operates under.
    fn settings(&self) -> &StorageSettings;
}

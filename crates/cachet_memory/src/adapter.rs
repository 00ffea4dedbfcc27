// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Moka-backed in-memory adapter.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::{future::Cache, Expiry};

use cachet_store::{ConnectionStatus, Result, StorageAdapter};

use crate::builder::MemoryAdapterBuilder;

/// A stored raw value together with its requested lifetime.
#[derive(Clone, Debug)]
pub(crate) struct StoredValue {
    pub(crate) value: String,
    pub(crate) ttl: Option<Duration>,
}

/// Expires each entry after its own requested TTL; entries without one live
/// until evicted by capacity.
pub(crate) struct PerEntryExpiry;

impl Expiry<String, StoredValue> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// An in-memory backend built on moka.
///
/// Entries honour a per-write TTL; lock records live in a separate map whose
/// TTL bounds the damage of a crashed lock holder. The adapter is always
/// connected.
///
/// # Examples
///
/// ```
/// use cachet_memory::MemoryAdapter;
///
/// let adapter = MemoryAdapter::builder()
///     .max_capacity(10_000)
///     .build();
/// # let _ = adapter;
/// ```
#[derive(Clone, Debug)]
pub struct MemoryAdapter {
    entries: Cache<String, StoredValue>,
    locks: Cache<String, ()>,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    /// Creates an unbounded adapter with the default lock TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring the adapter.
    #[must_use]
    pub fn builder() -> MemoryAdapterBuilder {
        MemoryAdapterBuilder::new()
    }

    pub(crate) fn from_builder(builder: &MemoryAdapterBuilder) -> Self {
        let mut entries = Cache::builder().expire_after(PerEntryExpiry);
        if let Some(capacity) = builder.max_capacity {
            entries = entries.max_capacity(capacity);
        }
        if let Some(capacity) = builder.initial_capacity {
            entries = entries.initial_capacity(capacity);
        }

        let locks = Cache::builder().time_to_live(builder.lock_ttl).build();

        Self {
            entries: entries.build(),
            locks,
        }
    }

    /// Returns the number of stored entries.
    ///
    /// The count is approximate while expired entries await cleanup.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).await.map(|stored| stored.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool> {
        self.entries
            .insert(
                key.to_string(),
                StoredValue {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).await.is_some())
    }

    async fn acquire_lock(&self, key: &str) -> Result<bool> {
        let entry = self.locks.entry(key.to_string()).or_insert(()).await;
        Ok(entry.is_fresh())
    }

    async fn release_lock(&self, key: &str) -> Result<bool> {
        Ok(self.locks.remove(key).await.is_some())
    }

    async fn is_lock_exists(&self, key: &str) -> Result<bool> {
        Ok(self.locks.contains_key(key))
    }

    fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus::Connected
    }
}

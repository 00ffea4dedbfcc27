// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wrapper that layers the record/tag discipline over a raw adapter.
//!
//! [`RecordStorage`] turns any [`StorageAdapter`] into a [`Storage`]: it
//! serializes record envelopes, captures tag versions on write, evaluates
//! staleness on read, and bounds every backend call with the configured
//! operation timeout.

use std::{future::Future, time::Duration};

use async_trait::async_trait;

use crate::{
    adapter::{ConnectionStatus, StorageAdapter},
    clock::Clock,
    error::{Error, Result},
    record::{Record, TagVersion},
    storage::{Storage, StorageSettings, WriteOptions},
};

/// Reserved key prefix for tag version entries in the shared keyspace.
const TAG_KEY_PREFIX: &str = "tag:";

fn tag_key(name: &str) -> String {
    format!("{TAG_KEY_PREFIX}{name}")
}

/// Enforces the record model on top of a raw backend.
///
/// On `set` the wrapper resolves the caller's tag source, snapshots current
/// tag versions (creating missing tags at "now"), composes the envelope and
/// writes it as one opaque blob. On `get` it decodes the envelope;
/// [`is_outdated`](Storage::is_outdated) compares captured versions against
/// the live tag store.
///
/// Tag versions live in the same keyspace as records, under a reserved
/// `tag:` prefix, and are never garbage-collected.
///
/// # Examples
///
/// ```no_run
/// use cachet_store::{Clock, RecordStorage, Storage, WriteOptions};
/// use cachet_store::testing::MockAdapter;
///
/// # async fn demo() -> cachet_store::Result<()> {
/// let storage = RecordStorage::new(MockAdapter::new(), Clock::new_frozen());
///
/// let record = storage
///     .set("user:1", "{\"id\":1}".to_string(), &WriteOptions::new().tags(vec!["users".to_string()]))
///     .await?;
/// assert_eq!(record.tags.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RecordStorage<A> {
    adapter: A,
    clock: Clock,
    settings: StorageSettings,
}

impl<A: StorageAdapter> RecordStorage<A> {
    /// Creates a record storage over the given adapter with default settings.
    pub fn new(adapter: A, clock: Clock) -> Self {
        Self {
            adapter,
            clock,
            settings: StorageSettings::default(),
        }
    }

    /// Replaces the storage settings.
    #[must_use]
    pub fn with_settings(mut self, settings: StorageSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns a reference to the wrapped adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Bounds a backend call with the configured operation timeout.
    async fn bounded<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        match tokio::time::timeout(self.settings.operation_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.settings.operation_timeout)),
        }
    }

    /// Reads raw versions for the given tag names without creating them.
    async fn read_tag_versions(&self, names: &[String]) -> Result<Vec<Option<u64>>> {
        let keys: Vec<String> = names.iter().map(|n| tag_key(n)).collect();
        let raw = self.bounded(self.adapter.mget(&keys)).await?;
        Ok(raw
            .into_iter()
            .map(|v| v.and_then(|s| s.parse::<u64>().ok()))
            .collect())
    }

    fn resolve_ttl(&self, options: &WriteOptions) -> u64 {
        let ttl = options.expires_in.unwrap_or(self.settings.default_ttl);
        u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
    }
}

#[async_trait]
impl<A: StorageAdapter> Storage for RecordStorage<A> {
    async fn get(&self, key: &str) -> Result<Option<Record>> {
        let raw = self.bounded(self.adapter.get(key)).await?;
        match raw {
            Some(blob) => Ok(Some(Record::from_json(&blob)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, options: &WriteOptions) -> Result<Record> {
        let tag_names = options.tags.resolve();
        let tags = self.get_tags(&tag_names).await?;
        let now = self.clock.epoch_millis();

        let record = if options.permanent {
            Record::permanent(key, value, now)
        } else {
            Record::new(key, value, now, self.resolve_ttl(options))
        }
        .with_tags(tags);

        let blob = record.to_json()?;
        let ttl = if record.permanent {
            None
        } else {
            Some(Duration::from_millis(record.expires_in))
        };
        self.bounded(self.adapter.set(key, &blob, ttl)).await?;
        Ok(record)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.bounded(self.adapter.del(key)).await
    }

    async fn touch(&self, tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let now = self.clock.epoch_millis().to_string();
        let pairs: Vec<(String, String)> = tags.iter().map(|n| (tag_key(n), now.clone())).collect();
        self.bounded(self.adapter.mset(&pairs, None)).await
    }

    async fn get_tags(&self, names: &[String]) -> Result<Vec<TagVersion>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let versions = self.read_tag_versions(names).await?;
        let now = self.clock.epoch_millis();

        // Vacuum-fill: a tag seen for the first time starts at "now".
        let missing: Vec<(String, String)> = names
            .iter()
            .zip(&versions)
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| (tag_key(name), now.to_string()))
            .collect();
        if !missing.is_empty() {
            tracing::debug!(count = missing.len(), "creating first-seen tags at current version");
            self.bounded(self.adapter.mset(&missing, None)).await?;
        }

        Ok(names
            .iter()
            .zip(versions)
            .map(|(name, version)| TagVersion::new(name.clone(), version.unwrap_or(now)))
            .collect())
    }

    async fn is_outdated(&self, record: &Record) -> Result<bool> {
        if record.tags.is_empty() {
            return Ok(false);
        }

        let names: Vec<String> = record.tags.iter().map(|t| t.name.clone()).collect();
        // A tag absent from the store cannot outdate a record; only a
        // strictly greater stored version invalidates.
        let current = self.read_tag_versions(&names).await?;
        Ok(record
            .tags
            .iter()
            .zip(current)
            .any(|(captured, live)| live.is_some_and(|v| v > captured.version)))
    }

    async fn lock_key(&self, key: &str) -> Result<bool> {
        self.bounded(self.adapter.acquire_lock(key)).await
    }

    async fn release_key(&self, key: &str) -> Result<bool> {
        self.bounded(self.adapter.release_lock(key)).await
    }

    async fn key_is_locked(&self, key: &str) -> Result<bool> {
        self.bounded(self.adapter.is_lock_exists(key)).await
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.adapter.connection_status()
    }

    fn clock(&self) -> &Clock {
        &self.clock
    }

    fn settings(&self) -> &StorageSettings {
        &self.settings
    }
}

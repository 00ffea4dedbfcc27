// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for constructing a cache with its default managers.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::RwLock;

use cachet_store::{Clock, Error, Result, Storage};

use crate::{
    bloom::{BloomConfig, BloomFilter},
    cache::Cache,
    managers::{ReadThroughManager, RefreshAheadManager, WriteThroughManager},
    telemetry::CacheTelemetry,
};

/// Builder for a [`Cache`].
///
/// Configures the default storage, TTL, key discipline and bloom pre-check,
/// then constructs the cache with the three single-tier managers
/// (read-through, write-through, refresh-ahead) registered. The default
/// dispatch target is read-through. A multi-level manager, when needed, is
/// registered separately via [`Cache::register_manager`].
///
/// # Examples
///
/// ```no_run
/// use cachet::{BloomConfig, Cache};
/// use cachet_store::Clock;
/// use std::time::Duration;
///
/// # fn demo() -> cachet_store::Result<()> {
/// let cache = Cache::builder(Clock::new())
///     .memory()
///     .default_ttl(Duration::from_secs(300))
///     .prefix("app")
///     .bloom_filter(BloomConfig::default())
///     .build()?;
/// # let _ = cache;
/// # Ok(())
/// # }
/// ```
pub struct CacheBuilder {
    clock: Clock,
    storage: Option<Arc<dyn Storage>>,
    default_manager: String,
    default_ttl: Option<Duration>,
    prefix: Option<String>,
    hash_keys: bool,
    bloom: Option<BloomConfig>,
    refresh_ahead_factor: f64,
    telemetry: Option<CacheTelemetry>,
}

impl std::fmt::Debug for CacheBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("default_manager", &self.default_manager)
            .field("default_ttl", &self.default_ttl)
            .field("prefix", &self.prefix)
            .field("hash_keys", &self.hash_keys)
            .field("bloom", &self.bloom)
            .field("refresh_ahead_factor", &self.refresh_ahead_factor)
            .finish_non_exhaustive()
    }
}

impl CacheBuilder {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            clock,
            storage: None,
            default_manager: ReadThroughManager::NAME.to_string(),
            default_ttl: None,
            prefix: None,
            hash_keys: false,
            bloom: None,
            refresh_ahead_factor: RefreshAheadManager::DEFAULT_FACTOR,
            telemetry: None,
        }
    }

    /// Sets the default storage backing the built-in managers.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Uses an in-memory adapter as the default storage.
    #[cfg(feature = "memory")]
    #[must_use]
    pub fn memory(self) -> Self {
        let clock = self.clock.clone();
        self.storage(Arc::new(cachet_store::RecordStorage::new(
            cachet_memory::MemoryAdapter::new(),
            clock,
        )))
    }

    /// Sets the manager name `get`/`set`/`del` dispatch to by default.
    #[must_use]
    pub fn default_manager(mut self, name: impl Into<String>) -> Self {
        self.default_manager = name.into();
        self
    }

    /// Sets the TTL applied when a call omits `expires_in`.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Prepends `prefix:` to every key.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Digests keys before storage to bound their length. Tag names are
    /// never hashed.
    #[must_use]
    pub fn hash_keys(mut self) -> Self {
        self.hash_keys = true;
        self
    }

    /// Enables the bloom pre-check, shared by every built-in manager.
    #[must_use]
    pub fn bloom_filter(mut self, config: BloomConfig) -> Self {
        self.bloom = Some(config);
        self
    }

    /// Sets the refresh-ahead window fraction for the built-in
    /// refresh-ahead manager.
    #[must_use]
    pub fn refresh_ahead_factor(mut self, factor: f64) -> Self {
        self.refresh_ahead_factor = factor;
        self
    }

    /// Replaces the telemetry sink shared by the built-in managers.
    #[must_use]
    pub fn telemetry(mut self, telemetry: CacheTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds the cache and registers the built-in managers.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no storage was provided, the bloom
    /// sizing parameters are degenerate, or the refresh-ahead factor is out
    /// of range.
    pub fn build(self) -> Result<Cache> {
        let storage = self
            .storage
            .ok_or_else(|| Error::config("a default storage is required"))?;
        let telemetry = self.telemetry.unwrap_or_default();
        let bloom = match self.bloom {
            Some(config) => Some(Arc::new(BloomFilter::new(config)?)),
            None => None,
        };

        let cache = Cache {
            storage: Arc::clone(&storage),
            managers: RwLock::new(HashMap::new()),
            default_manager: self.default_manager,
            default_ttl: self.default_ttl,
            prefix: self.prefix,
            hash_keys: self.hash_keys,
            bloom: bloom.clone(),
            telemetry: telemetry.clone(),
        };

        let mut read_through =
            ReadThroughManager::new(Arc::clone(&storage)).with_telemetry(telemetry.clone());
        let mut write_through =
            WriteThroughManager::new(Arc::clone(&storage)).with_telemetry(telemetry.clone());
        let mut refresh_ahead = RefreshAheadManager::new(Arc::clone(&storage))
            .with_factor(self.refresh_ahead_factor)?
            .with_telemetry(telemetry);
        if let Some(bloom) = &bloom {
            read_through = read_through.with_bloom(Arc::clone(bloom));
            write_through = write_through.with_bloom(Arc::clone(bloom));
            refresh_ahead = refresh_ahead.with_bloom(Arc::clone(bloom));
        }
        cache.register_manager(Arc::new(read_through));
        cache.register_manager(Arc::new(write_through));
        cache.register_manager(Arc::new(refresh_ahead));

        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_a_storage() {
        let err = Cache::builder(Clock::new_frozen()).build().expect_err("should fail");
        assert!(matches!(err, Error::Config(_)));
    }

    #[cfg(feature = "memory")]
    #[test]
    fn build_registers_the_three_disciplines() {
        let cache = Cache::builder(Clock::new_frozen())
            .memory()
            .build()
            .expect("build failed");

        let mut names: Vec<String> = cache.managers.read().keys().cloned().collect();
        names.sort();
        assert_eq!(names, vec!["read-through", "refresh-ahead", "write-through"]);
    }

    #[cfg(feature = "memory")]
    #[test]
    fn build_rejects_out_of_range_refresh_factor() {
        let err = Cache::builder(Clock::new_frozen())
            .memory()
            .refresh_ahead_factor(1.5)
            .build()
            .expect_err("should fail");
        assert!(matches!(err, Error::Config(_)));
    }

    #[cfg(feature = "memory")]
    #[test]
    fn build_rejects_degenerate_bloom_sizing() {
        let err = Cache::builder(Clock::new_frozen())
            .memory()
            .bloom_filter(BloomConfig {
                expected_elements: 0,
                false_positive_rate: 0.01,
            })
            .build()
            .expect_err("should fail");
        assert!(matches!(err, Error::Config(_)));
    }
}

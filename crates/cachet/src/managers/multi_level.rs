// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Multi-level discipline: ordered raw tiers with warm-up and per-tier
//! metrics.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::future::join_all;

use cachet_store::{Clock, Error, Record, Result, StorageAdapter, TagVersion};

use crate::{
    bloom::BloomFilter,
    manager::{Executor, Manager},
    options::{GetOptions, SetOptions},
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
};

/// What a multi-level `get` does when every tier misses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FallbackStrategy {
    /// Run the executor, write the result to all enabled tiers, return it.
    /// The default.
    #[default]
    Executor,
    /// Reserved for chained loaders; currently behaves like
    /// [`Executor`](FallbackStrategy::Executor).
    NextLevel,
    /// Raise a miss error instead of computing.
    Fail,
}

/// Construction-time description of one tier.
#[derive(Clone)]
pub struct LevelConfig {
    /// Name used for metrics and runtime enable/disable.
    pub name: String,
    /// The raw backend serving this tier.
    pub adapter: Arc<dyn StorageAdapter>,
    /// Tiers are consulted in ascending priority order.
    pub priority: u32,
    /// Tier-specific TTL; wins over the caller's `expires_in` and over
    /// `permanent`.
    pub ttl: Option<Duration>,
    /// Whether the tier starts enabled.
    pub enabled: bool,
}

impl LevelConfig {
    /// Creates an enabled tier with no tier-specific TTL.
    pub fn new(name: impl Into<String>, adapter: Arc<dyn StorageAdapter>, priority: u32) -> Self {
        Self {
            name: name.into(),
            adapter,
            priority,
            ttl: None,
            enabled: true,
        }
    }

    /// Sets the tier-specific TTL.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Starts the tier disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl std::fmt::Debug for LevelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelConfig")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("ttl", &self.ttl)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct LevelCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    dels: AtomicU64,
}

struct Level {
    name: String,
    adapter: Arc<dyn StorageAdapter>,
    priority: u32,
    ttl: Option<Duration>,
    enabled: AtomicBool,
    counters: LevelCounters,
}

impl Level {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn effective_ttl(&self, requested: Option<Duration>) -> Option<Duration> {
        self.ttl.or(requested)
    }
}

/// Per-tier hit/miss/set/del counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelMetrics {
    /// The tier name.
    pub name: String,
    /// Reads served by this tier.
    pub hits: u64,
    /// Reads this tier could not serve, including tier failures.
    pub misses: u64,
    /// Successful writes to this tier, including warm-ups.
    pub sets: u64,
    /// Successful removals from this tier.
    pub dels: u64,
}

/// Static description of one tier, in priority order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelStats {
    /// The tier name.
    pub name: String,
    /// The tier priority.
    pub priority: u32,
    /// The tier-specific TTL, if any.
    pub ttl: Option<Duration>,
    /// Whether the tier is currently enabled.
    pub enabled: bool,
}

/// Composes several raw storage tiers with first-hit-wins reads.
///
/// Tiers are walked in ascending priority order. The first enabled tier
/// holding the key serves the request; every higher-priority tier is then
/// warmed with the hit value using that tier's TTL (else the call's
/// `expires_in`). Warm-up writes the raw value only — tag metadata does not
/// propagate across tiers, staleness within a tier is the tier's
/// responsibility.
///
/// Writes and removals fan out to every enabled tier; individual tier
/// failures are logged and do not abort the operation.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use cachet::{FallbackStrategy, LevelConfig, MultiLevelManager};
/// use cachet_memory::MemoryAdapter;
/// use cachet_store::Clock;
/// use std::time::Duration;
///
/// # fn demo() -> cachet_store::Result<()> {
/// let manager = MultiLevelManager::new(
///     vec![
///         LevelConfig::new("l1", Arc::new(MemoryAdapter::new()), 0).ttl(Duration::from_secs(30)),
///         LevelConfig::new("l2", Arc::new(MemoryAdapter::new()), 1),
///     ],
///     Clock::new(),
/// )?
/// .with_fallback_strategy(FallbackStrategy::Executor);
/// # let _ = manager;
/// # Ok(())
/// # }
/// ```
pub struct MultiLevelManager {
    levels: Vec<Level>,
    fallback: FallbackStrategy,
    bloom: Option<Arc<BloomFilter>>,
    telemetry: CacheTelemetry,
    clock: Clock,
}

impl MultiLevelManager {
    /// The default registration name.
    pub const NAME: &'static str = "multi-level";

    /// Creates a manager over the given tiers, sorted by ascending priority.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no tiers are given or two tiers
    /// share a name.
    pub fn new(configs: Vec<LevelConfig>, clock: Clock) -> Result<Self> {
        if configs.is_empty() {
            return Err(Error::config("multi-level manager requires at least one level"));
        }

        let mut levels: Vec<Level> = configs
            .into_iter()
            .map(|config| Level {
                name: config.name,
                adapter: config.adapter,
                priority: config.priority,
                ttl: config.ttl,
                enabled: AtomicBool::new(config.enabled),
                counters: LevelCounters::default(),
            })
            .collect();
        levels.sort_by_key(|level| level.priority);

        let mut names: Vec<&str> = levels.iter().map(|level| level.name.as_str()).collect();
        names.sort_unstable();
        if let Some(duplicate) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::config(format!("duplicate level name {:?}", duplicate[0])));
        }

        Ok(Self {
            levels,
            fallback: FallbackStrategy::default(),
            bloom: None,
            telemetry: CacheTelemetry::default(),
            clock,
        })
    }

    /// Sets the behavior when every tier misses.
    #[must_use]
    pub fn with_fallback_strategy(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Enables the bloom pre-check with the given filter.
    ///
    /// The pre-check runs once per `get`, across the whole manager rather
    /// than per tier.
    #[must_use]
    pub fn with_bloom(mut self, bloom: Arc<BloomFilter>) -> Self {
        self.bloom = Some(bloom);
        self
    }

    /// Replaces the telemetry sink.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: CacheTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Returns the tier names in priority order.
    #[must_use]
    pub fn levels(&self) -> Vec<String> {
        self.levels.iter().map(|level| level.name.clone()).collect()
    }

    /// Enables the named tier.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown name.
    pub fn enable_level(&self, name: &str) -> Result<()> {
        self.set_enabled(name, true)
    }

    /// Disables the named tier. Disabled tiers are skipped by every
    /// operation until re-enabled.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown name.
    pub fn disable_level(&self, name: &str) -> Result<()> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let level = self
            .levels
            .iter()
            .find(|level| level.name == name)
            .ok_or_else(|| Error::config(format!("unknown level {name:?}")))?;
        level.enabled.store(enabled, Ordering::Release);
        Ok(())
    }

    /// Returns static tier descriptions in priority order.
    #[must_use]
    pub fn level_stats(&self) -> Vec<LevelStats> {
        self.levels
            .iter()
            .map(|level| LevelStats {
                name: level.name.clone(),
                priority: level.priority,
                ttl: level.ttl,
                enabled: level.is_enabled(),
            })
            .collect()
    }

    /// Returns per-tier counters in priority order.
    #[must_use]
    pub fn metrics(&self) -> Vec<LevelMetrics> {
        self.levels
            .iter()
            .map(|level| LevelMetrics {
                name: level.name.clone(),
                hits: level.counters.hits.load(Ordering::Relaxed),
                misses: level.counters.misses.load(Ordering::Relaxed),
                sets: level.counters.sets.load(Ordering::Relaxed),
                dels: level.counters.dels.load(Ordering::Relaxed),
            })
            .collect()
    }

    /// Warms every enabled tier above the hit with the hit value.
    async fn warm_upper_levels(&self, hit_index: usize, key: &str, value: &str, requested_ttl: Option<Duration>) {
        for level in self.levels[..hit_index].iter().filter(|l| l.is_enabled()) {
            match level.adapter.set(key, value, level.effective_ttl(requested_ttl)).await {
                Ok(_) => {
                    level.counters.sets.fetch_add(1, Ordering::Relaxed);
                }
                Err(error) => {
                    tracing::warn!(manager = Self::NAME, level = %level.name, key, %error, "tier warm-up failed");
                }
            }
        }
    }

    /// Writes `value` to every enabled tier with the tier's effective TTL.
    ///
    /// Returns how many tier writes succeeded.
    async fn set_enabled_levels(&self, key: &str, value: &str, requested_ttl: Option<Duration>) -> usize {
        let writes = self
            .levels
            .iter()
            .filter(|level| level.is_enabled())
            .map(|level| async move {
                match level.adapter.set(key, value, level.effective_ttl(requested_ttl)).await {
                    Ok(_) => {
                        level.counters.sets.fetch_add(1, Ordering::Relaxed);
                        true
                    }
                    Err(error) => {
                        tracing::warn!(manager = Self::NAME, level = %level.name, key, %error, "tier write failed");
                        false
                    }
                }
            });
        join_all(writes).await.into_iter().filter(|ok| *ok).count()
    }

    async fn run_fallback(&self, key: &str, executor: Executor, options: &GetOptions) -> Result<String> {
        match self.fallback {
            // NextLevel is reserved for chained loaders and currently
            // routes to the executor branch.
            FallbackStrategy::Executor | FallbackStrategy::NextLevel => {
                let value = executor().await.map_err(Error::Executor)?;
                self.set_enabled_levels(key, &value, options.expires_in).await;
                if let Some(bloom) = &self.bloom {
                    bloom.add(key);
                }
                Ok(value)
            }
            FallbackStrategy::Fail => Err(Error::Miss { key: key.to_string() }),
        }
    }
}

impl std::fmt::Debug for MultiLevelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiLevelManager")
            .field("levels", &self.levels())
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Manager for MultiLevelManager {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get(&self, key: &str, executor: Executor, options: &GetOptions) -> Result<String> {
        if let Some(bloom) = &self.bloom {
            if !bloom.might_contain(key) {
                self.telemetry
                    .record(Self::NAME, CacheOperation::Get, CacheActivity::BloomRejected);
                return self.run_fallback(key, executor, options).await;
            }
        }

        for (index, level) in self.levels.iter().enumerate() {
            if !level.is_enabled() {
                continue;
            }
            match level.adapter.get(key).await {
                Ok(Some(value)) => {
                    level.counters.hits.fetch_add(1, Ordering::Relaxed);
                    self.telemetry
                        .record(Self::NAME, CacheOperation::Get, CacheActivity::Hit);
                    self.warm_upper_levels(index, key, &value, options.expires_in).await;
                    return Ok(value);
                }
                Ok(None) => {
                    level.counters.misses.fetch_add(1, Ordering::Relaxed);
                }
                Err(error) => {
                    level.counters.misses.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(manager = Self::NAME, level = %level.name, key, %error, "tier read failed");
                }
            }
        }

        self.telemetry
            .record(Self::NAME, CacheOperation::Get, CacheActivity::Miss);
        self.run_fallback(key, executor, options).await
    }

    async fn set(&self, key: &str, value: String, options: &SetOptions) -> Result<Record> {
        // Tier TTL wins over `permanent`: tiers always receive their own
        // effective TTL regardless of the permanence flag.
        self.set_enabled_levels(key, &value, options.expires_in).await;
        if let Some(bloom) = &self.bloom {
            bloom.add(key);
        }
        self.telemetry
            .record(Self::NAME, CacheOperation::Set, CacheActivity::Inserted);

        let now = self.clock.epoch_millis();
        let tags = options
            .tags
            .resolve()
            .into_iter()
            .map(|name| TagVersion::new(name, now))
            .collect();
        let expires_in = options
            .expires_in
            .map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        let record = if options.permanent {
            Record::permanent(key, value, now)
        } else {
            Record::new(key, value, now, expires_in)
        };
        Ok(record.with_tags(tags))
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let removals = self
            .levels
            .iter()
            .filter(|level| level.is_enabled())
            .map(|level| async move {
                match level.adapter.del(key).await {
                    Ok(true) => {
                        level.counters.dels.fetch_add(1, Ordering::Relaxed);
                        true
                    }
                    Ok(false) => false,
                    Err(error) => {
                        tracing::warn!(manager = Self::NAME, level = %level.name, key, %error, "tier removal failed");
                        false
                    }
                }
            });
        let any = join_all(removals).await.into_iter().any(|removed| removed);
        if any {
            self.telemetry
                .record(Self::NAME, CacheOperation::Del, CacheActivity::Deleted);
        }
        Ok(any)
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Refresh-ahead discipline: serve fresh, refresh aging records in the
//! background.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;

use cachet_store::{Error, Record, Result, Storage};

use crate::{
    bloom::BloomFilter,
    manager::{Executor, Manager},
    options::{GetOptions, SetOptions},
    recompute::{self, RecomputeContext},
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
};

/// Prefix deriving the background-refresh lock key from the record key.
const REFRESH_LOCK_PREFIX: &str = "refresh-ahead:";

/// Read-through behavior plus asynchronous refresh of records that are
/// still fresh but past a configurable fraction of their lifetime.
///
/// When a fresh record is older than `expires_in × factor`, the caller gets
/// the current value immediately and a background task recomputes the record
/// under a derived lock (`refresh-ahead:<key>`). Errors in the background
/// task are logged and swallowed. An in-process in-flight set prevents
/// spawning duplicate tasks for the same key; the derived lock arbitrates
/// across processes.
pub struct RefreshAheadManager {
    storage: Arc<dyn Storage>,
    bloom: Option<Arc<BloomFilter>>,
    telemetry: CacheTelemetry,
    factor: f64,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl RefreshAheadManager {
    /// The default registration name.
    pub const NAME: &'static str = "refresh-ahead";

    /// The default refresh window fraction.
    pub const DEFAULT_FACTOR: f64 = 0.8;

    /// Creates a refresh-ahead manager with the default factor.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            bloom: None,
            telemetry: CacheTelemetry::default(),
            factor: Self::DEFAULT_FACTOR,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Sets the refresh window fraction.
    ///
    /// A record becomes refresh-eligible once it is older than
    /// `expires_in × factor`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error unless `0 < factor < 1`.
    pub fn with_factor(mut self, factor: f64) -> Result<Self> {
        if !(factor > 0.0 && factor < 1.0) {
            return Err(Error::config(format!(
                "refresh-ahead factor must be in (0, 1), got {factor}"
            )));
        }
        self.factor = factor;
        Ok(self)
    }

    /// Enables the bloom pre-check with the given filter.
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

    fn context(&self) -> RecomputeContext<'_> {
        RecomputeContext {
            storage: &self.storage,
            bloom: self.bloom.as_ref(),
            telemetry: &self.telemetry,
            manager: Self::NAME,
        }
    }

    fn should_refresh(&self, record: &Record) -> bool {
        if record.permanent {
            return false;
        }
        let now = self.storage.clock().epoch_millis();
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let window = (record.expires_in as f64 * self.factor) as u64;
        now > record.created_at.saturating_add(window)
    }

    /// Fires the background refresh unless one is already running for this
    /// key in this process.
    fn schedule_refresh(&self, key: &str, executor: Executor, options: &GetOptions) {
        if !self.in_flight.lock().insert(key.to_string()) {
            return;
        }
        self.telemetry
            .record(Self::NAME, CacheOperation::Get, CacheActivity::RefreshScheduled);

        let storage = Arc::clone(&self.storage);
        let telemetry = self.telemetry.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let write_options = options.write_options();
        let key = key.to_string();

        tokio::spawn(async move {
            let refresh_key = format!("{REFRESH_LOCK_PREFIX}{key}");
            match storage.lock_key(&refresh_key).await {
                Ok(true) => {
                    match executor().await {
                        Ok(value) => match storage.set(&key, value, &write_options).await {
                            Ok(_) => telemetry.record(
                                Self::NAME,
                                CacheOperation::Set,
                                CacheActivity::RefreshCompleted,
                            ),
                            Err(error) => {
                                tracing::warn!(manager = Self::NAME, key, %error, "refresh write-back failed");
                                telemetry.record(
                                    Self::NAME,
                                    CacheOperation::Set,
                                    CacheActivity::RefreshFailed,
                                );
                            }
                        },
                        Err(error) => {
                            tracing::warn!(manager = Self::NAME, key, %error, "refresh executor failed");
                            telemetry.record(
                                Self::NAME,
                                CacheOperation::Get,
                                CacheActivity::RefreshFailed,
                            );
                        }
                    }
                    if let Err(error) = storage.release_key(&refresh_key).await {
                        tracing::warn!(manager = Self::NAME, key, %error, "refresh lock release failed");
                    }
                }
                Ok(false) => {
                    tracing::debug!(manager = Self::NAME, key, "refresh already in progress elsewhere");
                }
                Err(error) => {
                    tracing::warn!(manager = Self::NAME, key, %error, "refresh lock acquisition failed");
                    telemetry.record(Self::NAME, CacheOperation::Get, CacheActivity::RefreshFailed);
                }
            }
            in_flight.lock().remove(&key);
        });
    }
}

impl std::fmt::Debug for RefreshAheadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshAheadManager")
            .field("factor", &self.factor)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Manager for RefreshAheadManager {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get(&self, key: &str, executor: Executor, options: &GetOptions) -> Result<String> {
        if let Some(bloom) = &self.bloom {
            if !bloom.might_contain(key) {
                self.telemetry
                    .record(Self::NAME, CacheOperation::Get, CacheActivity::BloomRejected);
                return recompute::update_and_get(
                    self.context(),
                    key,
                    executor,
                    options.strategy,
                    &options.write_options(),
                )
                .await;
            }
        }

        match self.storage.get(key).await {
            Ok(Some(record)) => {
                if recompute::is_fresh(&*self.storage, &record).await {
                    if self.should_refresh(&record) {
                        self.schedule_refresh(key, executor, options);
                    }
                    self.telemetry
                        .record(Self::NAME, CacheOperation::Get, CacheActivity::Hit);
                    return Ok(record.value);
                }
                self.telemetry
                    .record(Self::NAME, CacheOperation::Get, CacheActivity::Stale);
            }
            Ok(None) => {
                self.telemetry
                    .record(Self::NAME, CacheOperation::Get, CacheActivity::Miss);
            }
            Err(error) => {
                tracing::warn!(manager = Self::NAME, key, %error, "cache read degraded to miss");
                self.telemetry
                    .record(Self::NAME, CacheOperation::Get, CacheActivity::Error);
            }
        }

        recompute::update_and_get(
            self.context(),
            key,
            executor,
            options.strategy,
            &options.write_options(),
        )
        .await
    }

    async fn set(&self, key: &str, value: String, options: &SetOptions) -> Result<Record> {
        let record = self.storage.set(key, value, &options.write_options()).await?;
        if let Some(bloom) = &self.bloom {
            bloom.add(key);
        }
        self.telemetry
            .record(Self::NAME, CacheOperation::Set, CacheActivity::Inserted);
        Ok(record)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let removed = self.storage.del(key).await?;
        if removed {
            self.telemetry
                .record(Self::NAME, CacheOperation::Del, CacheActivity::Deleted);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_store::{testing::MockAdapter, Clock, RecordStorage};

    fn manager() -> RefreshAheadManager {
        let storage: Arc<dyn Storage> =
            Arc::new(RecordStorage::new(MockAdapter::new(), Clock::new_frozen_at(0)));
        RefreshAheadManager::new(storage)
    }

    #[test]
    fn factor_must_be_a_proper_fraction() {
        assert!(manager().with_factor(0.0).is_err());
        assert!(manager().with_factor(1.0).is_err());
        assert!(manager().with_factor(-0.5).is_err());
        assert!(manager().with_factor(1.5).is_err());
        assert!(manager().with_factor(0.5).is_ok());
    }

    #[test]
    fn permanent_records_are_never_refreshed() {
        let manager = manager();
        let record = Record::permanent("k", "v".to_string(), 0);
        assert!(!manager.should_refresh(&record));
    }

    #[test]
    fn refresh_window_opens_after_the_factor_fraction() {
        let storage: Arc<dyn Storage> =
            Arc::new(RecordStorage::new(MockAdapter::new(), Clock::new_frozen_at(600)));
        let manager = RefreshAheadManager::new(storage)
            .with_factor(0.5)
            .expect("valid factor");

        // TTL 1000 at t=0, factor 0.5: window opens after t=500.
        let record = Record::new("k", "v".to_string(), 0, 1_000);
        assert!(manager.should_refresh(&record));

        let young = Record::new("k", "v".to_string(), 400, 1_000);
        assert!(!manager.should_refresh(&young));
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Read-through discipline: miss or stale means recompute.

use std::sync::Arc;

use async_trait::async_trait;

use cachet_store::{Record, Result, Storage};

use crate::{
    bloom::BloomFilter,
    manager::{Executor, Manager},
    options::{GetOptions, SetOptions},
    recompute::{self, RecomputeContext},
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
};

/// Serves reads from the store while it holds a fresh record and recomputes
/// through the caller's executor otherwise.
///
/// A record is served only when it is time-valid *and* none of its captured
/// tags have been touched since. Anything else (miss, stale, undecodable
/// blob, storage failure) routes to the stampede-protected recompute path.
pub struct ReadThroughManager {
    storage: Arc<dyn Storage>,
    bloom: Option<Arc<BloomFilter>>,
    telemetry: CacheTelemetry,
}

impl ReadThroughManager {
    /// The default registration name.
    pub const NAME: &'static str = "read-through";

    /// Creates a read-through manager over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            bloom: None,
            telemetry: CacheTelemetry::default(),
        }
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
}

impl std::fmt::Debug for ReadThroughManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughManager")
            .field("bloom", &self.bloom.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Manager for ReadThroughManager {
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

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Write-through discipline: the application keeps the cache current.

use std::sync::Arc;

use async_trait::async_trait;

use cachet_store::{Record, Result, Storage, WriteOptions};

use crate::{
    bloom::BloomFilter,
    manager::{Executor, Manager},
    options::{GetOptions, SetOptions},
    recompute::{self, RecomputeContext},
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
};

/// Stores authoritative, permanent records written by the application.
///
/// `set` always writes a permanent record: the application owns freshness
/// through explicit `set` and `touch` calls, so nothing time-expires. `get`
/// is a passive accessor — it returns whatever record exists without any
/// freshness check, including records whose tags have since been touched.
/// Only a true miss routes to the recompute path, which also writes
/// permanently.
pub struct WriteThroughManager {
    storage: Arc<dyn Storage>,
    bloom: Option<Arc<BloomFilter>>,
    telemetry: CacheTelemetry,
}

impl WriteThroughManager {
    /// The default registration name.
    pub const NAME: &'static str = "write-through";

    /// Creates a write-through manager over the given storage.
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

    fn permanent_write_options(options: &GetOptions) -> WriteOptions {
        WriteOptions {
            expires_in: options.expires_in,
            permanent: true,
            tags: options.tags.clone(),
        }
    }
}

impl std::fmt::Debug for WriteThroughManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteThroughManager")
            .field("bloom", &self.bloom.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Manager for WriteThroughManager {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn get(&self, key: &str, executor: Executor, options: &GetOptions) -> Result<String> {
        if let Some(bloom) = &self.bloom {
            if !bloom.might_contain(key) {
                self.telemetry
                    .record(Self::NAME, CacheOperation::Get, CacheActivity::BloomRejected);
                return recompute::update_and_get(
                    RecomputeContext {
                        storage: &self.storage,
                        bloom: self.bloom.as_ref(),
                        telemetry: &self.telemetry,
                        manager: Self::NAME,
                    },
                    key,
                    executor,
                    options.strategy,
                    &Self::permanent_write_options(options),
                )
                .await;
            }
        }

        match self.storage.get(key).await {
            Ok(Some(record)) => {
                // No freshness check: the application is responsible for
                // keeping write-through records current.
                self.telemetry
                    .record(Self::NAME, CacheOperation::Get, CacheActivity::Hit);
                return Ok(record.value);
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
            RecomputeContext {
                storage: &self.storage,
                bloom: self.bloom.as_ref(),
                telemetry: &self.telemetry,
                manager: Self::NAME,
            },
            key,
            executor,
            options.strategy,
            &Self::permanent_write_options(options),
        )
        .await
    }

    async fn set(&self, key: &str, value: String, options: &SetOptions) -> Result<Record> {
        let write = WriteOptions {
            expires_in: options.expires_in,
            permanent: true,
            tags: options.tags.clone(),
        };
        let record = self.storage.set(key, value, &write).await?;
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

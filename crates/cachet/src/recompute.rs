// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The stampede-protected recompute path shared by every single-tier
//! discipline.
//!
//! The routine is a free function parameterized over the manager's storage
//! and telemetry rather than a base type: disciplines differ in *when* they
//! recompute, not in *how*.

use std::{sync::Arc, time::Duration};

use cachet_store::{Error, Record, Result, Storage, WriteOptions};

use crate::{
    bloom::BloomFilter,
    manager::Executor,
    options::LockedKeyRetrieveStrategy,
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
};

/// First poll delay while waiting out another process's recompute.
const WAIT_INITIAL_DELAY: Duration = Duration::from_millis(50);
/// Backoff ceiling for the poll delay.
const WAIT_MAX_DELAY: Duration = Duration::from_millis(1_000);

/// The capabilities the recompute routine borrows from its manager.
pub(crate) struct RecomputeContext<'a> {
    pub storage: &'a Arc<dyn Storage>,
    pub bloom: Option<&'a Arc<BloomFilter>>,
    pub telemetry: &'a CacheTelemetry,
    pub manager: &'a str,
}

/// Returns true if the record is both time-valid and not tag-outdated.
///
/// A failed staleness query counts as stale: the caller recomputes rather
/// than serve a value it cannot vouch for.
pub(crate) async fn is_fresh(storage: &dyn Storage, record: &Record) -> bool {
    record.is_time_valid(storage.clock().epoch_millis())
        && !storage.is_outdated(record).await.unwrap_or(true)
}

/// Runs the executor under the per-key lock and writes the result back.
///
/// Exactly one caller per key wins the lock and recomputes; contenders
/// either wait for the winner's record or compute independently without
/// writing, according to `strategy`. The lock is always released, on
/// success and on executor failure alike.
pub(crate) async fn update_and_get(
    cx: RecomputeContext<'_>,
    key: &str,
    executor: Executor,
    strategy: LockedKeyRetrieveStrategy,
    write_options: &WriteOptions,
) -> Result<String> {
    match cx.storage.lock_key(key).await {
        Ok(true) => run_as_winner(cx, key, executor, write_options).await,
        Ok(false) => match strategy {
            LockedKeyRetrieveStrategy::WaitForResult => {
                wait_for_result(cx, key, executor).await
            }
            LockedKeyRetrieveStrategy::RunExecutor => run_without_writing(executor).await,
        },
        Err(error) => {
            // The lock store is unreachable; serve the caller directly and
            // leave the store alone.
            tracing::warn!(manager = cx.manager, key, %error, "lock acquisition failed");
            cx.telemetry
                .record(cx.manager, CacheOperation::Get, CacheActivity::Error);
            run_without_writing(executor).await
        }
    }
}

async fn run_as_winner(
    cx: RecomputeContext<'_>,
    key: &str,
    executor: Executor,
    write_options: &WriteOptions,
) -> Result<String> {
    match executor().await {
        Ok(value) => {
            match cx.storage.set(key, value.clone(), write_options).await {
                Ok(_) => {
                    if let Some(bloom) = cx.bloom {
                        bloom.add(key);
                    }
                    cx.telemetry
                        .record(cx.manager, CacheOperation::Set, CacheActivity::Inserted);
                }
                Err(error) => {
                    tracing::warn!(manager = cx.manager, key, %error, "write-back after recompute failed");
                    cx.telemetry
                        .record(cx.manager, CacheOperation::Set, CacheActivity::Error);
                }
            }
            release(&cx, key).await;
            Ok(value)
        }
        Err(cause) => {
            release(&cx, key).await;
            Err(Error::Executor(cause))
        }
    }
}

/// Polls the store with exponential backoff until the concurrent winner's
/// record appears fresh, bounded by the lock TTL. An exhausted wait falls
/// through to computing without writing.
async fn wait_for_result(cx: RecomputeContext<'_>, key: &str, executor: Executor) -> Result<String> {
    let budget = cx.storage.settings().lock_expire;
    let mut waited = Duration::ZERO;
    let mut delay = WAIT_INITIAL_DELAY;

    while waited < budget {
        tokio::time::sleep(delay).await;
        waited += delay;
        delay = (delay * 2).min(WAIT_MAX_DELAY);

        if let Ok(Some(record)) = cx.storage.get(key).await {
            if is_fresh(&**cx.storage, &record).await {
                cx.telemetry
                    .record(cx.manager, CacheOperation::Get, CacheActivity::Hit);
                return Ok(record.value);
            }
        }
    }

    tracing::debug!(manager = cx.manager, key, "lock wait exhausted, computing without write-back");
    run_without_writing(executor).await
}

async fn run_without_writing(executor: Executor) -> Result<String> {
    executor().await.map_err(Error::Executor)
}

async fn release(cx: &RecomputeContext<'_>, key: &str) {
    if let Err(error) = cx.storage.release_key(key).await {
        tracing::warn!(manager = cx.manager, key, %error, "lock release failed");
    }
}

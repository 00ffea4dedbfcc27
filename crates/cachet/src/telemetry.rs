// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache activity recording: counters plus structured log events.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// The operation a manager performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOperation {
    /// A read.
    Get,
    /// A write.
    Set,
    /// A removal.
    Del,
}

/// What happened during an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheActivity {
    /// A fresh record was served.
    Hit,
    /// No record was found.
    Miss,
    /// A record was found but failed a freshness check.
    Stale,
    /// The bloom pre-check short-circuited the storage read.
    BloomRejected,
    /// A record was written.
    Inserted,
    /// A record was removed.
    Deleted,
    /// A background refresh was scheduled.
    RefreshScheduled,
    /// A background refresh wrote a new record.
    RefreshCompleted,
    /// A background refresh failed; the error was logged and swallowed.
    RefreshFailed,
    /// The operation failed and was degraded or swallowed.
    Error,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    bloom_rejected: AtomicU64,
    inserted: AtomicU64,
    deleted: AtomicU64,
    refreshes_scheduled: AtomicU64,
    refreshes_completed: AtomicU64,
    refreshes_failed: AtomicU64,
    errors: AtomicU64,
}

/// Records cache activity as counters and `tracing` debug events.
///
/// Cheap to clone; clones share the same counters. One telemetry instance is
/// typically shared by every manager a cache constructs, so the snapshot
/// reflects the cache as a whole.
#[derive(Clone, Debug, Default)]
pub struct CacheTelemetry {
    counters: Arc<Counters>,
}

impl CacheTelemetry {
    /// Creates a telemetry instance with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one activity for the named manager.
    pub fn record(&self, manager: &str, operation: CacheOperation, activity: CacheActivity) {
        tracing::debug!(manager, ?operation, ?activity, "cache activity");
        let counter = match activity {
            CacheActivity::Hit => &self.counters.hits,
            CacheActivity::Miss => &self.counters.misses,
            CacheActivity::Stale => &self.counters.stale,
            CacheActivity::BloomRejected => &self.counters.bloom_rejected,
            CacheActivity::Inserted => &self.counters.inserted,
            CacheActivity::Deleted => &self.counters.deleted,
            CacheActivity::RefreshScheduled => &self.counters.refreshes_scheduled,
            CacheActivity::RefreshCompleted => &self.counters.refreshes_completed,
            CacheActivity::RefreshFailed => &self.counters.refreshes_failed,
            CacheActivity::Error => &self.counters.errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of all counters.
    ///
    /// Counters are updated with relaxed ordering; under concurrency the
    /// snapshot is eventually consistent.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let c = &self.counters;
        TelemetrySnapshot {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            stale: c.stale.load(Ordering::Relaxed),
            bloom_rejected: c.bloom_rejected.load(Ordering::Relaxed),
            inserted: c.inserted.load(Ordering::Relaxed),
            deleted: c.deleted.load(Ordering::Relaxed),
            refreshes_scheduled: c.refreshes_scheduled.load(Ordering::Relaxed),
            refreshes_completed: c.refreshes_completed.load(Ordering::Relaxed),
            refreshes_failed: c.refreshes_failed.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the telemetry counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct TelemetrySnapshot {
    pub hits: u64,
    pub misses: u64,
    pub stale: u64,
    pub bloom_rejected: u64,
    pub inserted: u64,
    pub deleted: u64,
    pub refreshes_scheduled: u64,
    pub refreshes_completed: u64,
    pub refreshes_failed: u64,
    pub errors: u64,
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-call options for cache reads and writes.

use std::time::Duration;

use cachet_store::{TagSource, WriteOptions};

/// What a reader does when another process holds the recompute lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LockedKeyRetrieveStrategy {
    /// Poll the store with exponential backoff until the lock holder's
    /// result appears, falling back to running the executor if the wait
    /// exhausts. The default.
    #[default]
    WaitForResult,
    /// Run the executor immediately and return its result without writing
    /// to the store, leaving the store to the concurrent winner.
    RunExecutor,
}

/// Options for a cache read.
///
/// # Examples
///
/// ```
/// use cachet::{GetOptions, LockedKeyRetrieveStrategy};
/// use std::time::Duration;
///
/// let options = GetOptions::new()
///     .expires_in(Duration::from_secs(60))
///     .tags(vec!["users".to_string()])
///     .strategy(LockedKeyRetrieveStrategy::RunExecutor);
/// assert_eq!(options.strategy, LockedKeyRetrieveStrategy::RunExecutor);
/// ```
#[derive(Clone, Debug, Default)]
pub struct GetOptions {
    /// Lifetime for a record written back after a recompute. Falls back to
    /// the cache's default TTL.
    pub expires_in: Option<Duration>,
    /// Tags captured when the recomputed value is written back.
    pub tags: TagSource,
    /// Manager to dispatch to; the cache's default when absent.
    pub manager: Option<String>,
    /// Behavior under recompute-lock contention.
    pub strategy: LockedKeyRetrieveStrategy,
}

impl GetOptions {
    /// Creates options with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the write-back lifetime.
    #[must_use]
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires_in = Some(ttl);
        self
    }

    /// Sets the tags captured on write-back.
    #[must_use]
    pub fn tags(mut self, tags: impl Into<TagSource>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Dispatches this call to a specific manager.
    #[must_use]
    pub fn manager(mut self, name: impl Into<String>) -> Self {
        self.manager = Some(name.into());
        self
    }

    /// Sets the contention strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: LockedKeyRetrieveStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub(crate) fn write_options(&self) -> WriteOptions {
        WriteOptions {
            expires_in: self.expires_in,
            permanent: false,
            tags: self.tags.clone(),
        }
    }
}

/// Options for a cache write.
#[derive(Clone, Debug, Default)]
pub struct SetOptions {
    /// Lifetime of the record. Falls back to the cache's default TTL.
    pub expires_in: Option<Duration>,
    /// Tags captured at write time.
    pub tags: TagSource,
    /// Manager to dispatch to; the cache's default when absent.
    pub manager: Option<String>,
    /// Disables time-based expiration for this record.
    pub permanent: bool,
}

impl SetOptions {
    /// Creates options with all defaults.
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

    /// Sets the tags captured at write time.
    #[must_use]
    pub fn tags(mut self, tags: impl Into<TagSource>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Dispatches this call to a specific manager.
    #[must_use]
    pub fn manager(mut self, name: impl Into<String>) -> Self {
        self.manager = Some(name.into());
        self
    }

    /// Marks the record permanent.
    #[must_use]
    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self
    }

    pub(crate) fn write_options(&self) -> WriteOptions {
        WriteOptions {
            expires_in: self.expires_in,
            permanent: self.permanent,
            tags: self.tags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strategy_waits_for_result() {
        assert_eq!(
            GetOptions::new().strategy,
            LockedKeyRetrieveStrategy::WaitForResult
        );
    }

    #[test]
    fn get_options_convert_to_non_permanent_writes() {
        let options = GetOptions::new().expires_in(Duration::from_secs(5));
        let write = options.write_options();
        assert_eq!(write.expires_in, Some(Duration::from_secs(5)));
        assert!(!write.permanent);
    }

    #[test]
    fn set_options_carry_permanence() {
        let write = SetOptions::new().permanent().write_options();
        assert!(write.permanent);
    }
}

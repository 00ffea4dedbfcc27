// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-memory adapters.

use std::time::Duration;

use crate::adapter::MemoryAdapter;

/// TTL applied to lock records unless overridden.
pub(crate) const DEFAULT_LOCK_TTL: Duration = Duration::from_millis(20_000);

/// Builder for configuring a [`MemoryAdapter`].
///
/// # Examples
///
/// ```
/// use cachet_memory::MemoryAdapter;
/// use std::time::Duration;
///
/// let adapter = MemoryAdapter::builder()
///     .max_capacity(10_000)
///     .initial_capacity(100)
///     .lock_ttl(Duration::from_secs(5))
///     .build();
/// # let _ = adapter;
/// ```
#[derive(Debug)]
pub struct MemoryAdapterBuilder {
    pub(crate) max_capacity: Option<u64>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) lock_ttl: Duration,
}

impl Default for MemoryAdapterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapterBuilder {
    /// Creates a new builder with default settings.
    ///
    /// The default configuration is an unbounded entry map and a 20-second
    /// lock TTL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_capacity: None,
            initial_capacity: None,
            lock_ttl: DEFAULT_LOCK_TTL,
        }
    }

    /// Sets the maximum number of entries.
    ///
    /// Once reached, entries are evicted by moka's `TinyLFU` policy. If not
    /// set, the map is bounded only by available memory.
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets the initial capacity (pre-allocation hint).
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Sets the TTL for lock records.
    ///
    /// A lock left behind by a crashed holder disappears after this long.
    #[must_use]
    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Builds the configured adapter.
    #[must_use]
    pub fn build(self) -> MemoryAdapter {
        MemoryAdapter::from_builder(&self)
    }
}

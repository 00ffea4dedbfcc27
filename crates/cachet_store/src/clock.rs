// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Epoch-millisecond time source with a frozen mode for tests.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// A cheap-to-clone time source producing epoch-millisecond timestamps.
///
/// Record creation times and tag versions are epoch-millisecond values, so
/// the clock deals in the same unit. A clock is either backed by the system
/// time or frozen at a manually-controlled instant. Frozen clocks are meant
/// for tests: they only move when [`advance`](Clock::advance) is called,
/// which makes expiration and refresh-window behavior deterministic.
///
/// Clones share the same underlying time; advancing one clone advances all.
///
/// # Examples
///
/// ```
/// use cachet_store::Clock;
/// use std::time::Duration;
///
/// let clock = Clock::new_frozen_at(1_000);
/// assert_eq!(clock.epoch_millis(), 1_000);
///
/// clock.advance(Duration::from_millis(500));
/// assert_eq!(clock.epoch_millis(), 1_500);
/// ```
#[derive(Clone, Debug)]
pub struct Clock {
    inner: Inner,
}

#[derive(Clone, Debug)]
enum Inner {
    System,
    Frozen(Arc<AtomicU64>),
}

impl Clock {
    /// Creates a clock backed by the system time.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Inner::System }
    }

    /// Creates a frozen clock starting at the current system time.
    ///
    /// The clock will not move until [`advance`](Clock::advance) is called.
    #[must_use]
    pub fn new_frozen() -> Self {
        Self::new_frozen_at(system_epoch_millis())
    }

    /// Creates a frozen clock starting at the given epoch-millisecond value.
    #[must_use]
    pub fn new_frozen_at(epoch_millis: u64) -> Self {
        Self {
            inner: Inner::Frozen(Arc::new(AtomicU64::new(epoch_millis))),
        }
    }

    /// Returns the current time as milliseconds since the Unix epoch.
    #[must_use]
    pub fn epoch_millis(&self) -> u64 {
        match &self.inner {
            Inner::System => system_epoch_millis(),
            Inner::Frozen(at) => at.load(Ordering::Acquire),
        }
    }

    /// Moves a frozen clock forward by the given duration.
    ///
    /// # Panics
    ///
    /// Panics if called on a system clock; only frozen clocks can be driven
    /// manually.
    pub fn advance(&self, duration: Duration) {
        match &self.inner {
            Inner::System => panic!("advance() requires a frozen clock"),
            Inner::Frozen(at) => {
                let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                at.fetch_add(millis, Ordering::AcqRel);
            }
        }
    }

    /// Returns true if this clock is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        matches!(self.inner, Inner::Frozen(_))
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

fn system_epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_clock_does_not_move_on_its_own() {
        let clock = Clock::new_frozen_at(42);
        assert_eq!(clock.epoch_millis(), 42);
        assert_eq!(clock.epoch_millis(), 42);
    }

    #[test]
    fn advance_moves_all_clones() {
        let clock = Clock::new_frozen_at(0);
        let clone = clock.clone();

        clock.advance(Duration::from_millis(250));
        assert_eq!(clone.epoch_millis(), 250);
    }

    #[test]
    fn system_clock_tracks_real_time() {
        let clock = Clock::new();
        let before = system_epoch_millis();
        let reading = clock.epoch_millis();
        assert!(reading >= before);
        assert!(!clock.is_frozen());
    }

    #[test]
    #[should_panic(expected = "frozen clock")]
    fn advance_on_system_clock_panics() {
        Clock::new().advance(Duration::from_millis(1));
    }
}

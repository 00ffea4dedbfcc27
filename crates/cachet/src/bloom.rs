// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Probabilistic membership pre-check for skipping definite misses.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use cachet_store::{Error, Result};

/// Sizing parameters for a [`BloomFilter`].
#[derive(Clone, Copy, Debug)]
pub struct BloomConfig {
    /// The number of distinct keys the filter is sized for.
    pub expected_elements: usize,
    /// The acceptable false-positive probability at capacity, in (0, 1).
    pub false_positive_rate: f64,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            expected_elements: 10_000,
            false_positive_rate: 0.01,
        }
    }
}

/// Point-in-time filter statistics.
#[derive(Clone, Copy, Debug)]
pub struct BloomStats {
    /// Bit-array size `m`.
    pub size: u64,
    /// Number of hash functions `k`.
    pub hash_count: u32,
    /// Number of `add` calls observed.
    pub element_count: usize,
    /// Empirical false-positive probability `(1 − e^(−kn/m))^k` for the
    /// current element count.
    pub false_positive_rate: f64,
    /// Fraction of the sized-for capacity currently used.
    pub load_factor: f64,
}

/// A fixed-size bloom filter over string keys.
///
/// Negative answers are authoritative: if [`might_contain`] returns false,
/// the key was never added and the storage read can be skipped entirely.
/// Positive answers are advisory and the read proceeds.
///
/// The bit array uses word-level atomic OR, so concurrent `add` calls are
/// benign; the element counter is advisory.
///
/// [`might_contain`]: BloomFilter::might_contain
///
/// # Examples
///
/// ```
/// use cachet::{BloomConfig, BloomFilter};
///
/// let filter = BloomFilter::new(BloomConfig::default()).unwrap();
/// filter.add("alpha");
///
/// assert!(filter.might_contain("alpha"));
/// ```
#[derive(Debug)]
pub struct BloomFilter {
    words: Vec<AtomicU64>,
    bit_count: u64,
    hash_count: u32,
    element_count: AtomicUsize,
    expected_elements: usize,
}

impl BloomFilter {
    /// Creates a filter sized for the given configuration.
    ///
    /// Bit-array size and hash count follow the standard derivation:
    /// `m = ⌈−n·ln(p) / (ln 2)²⌉` and `k = ⌈(m/n)·ln 2⌉`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `expected_elements` is zero or the
    /// false-positive rate is outside (0, 1).
    pub fn new(config: BloomConfig) -> Result<Self> {
        if config.expected_elements == 0 {
            return Err(Error::config("bloom filter expected_elements must be positive"));
        }
        if !(config.false_positive_rate > 0.0 && config.false_positive_rate < 1.0) {
            return Err(Error::config(format!(
                "bloom filter false_positive_rate must be in (0, 1), got {}",
                config.false_positive_rate
            )));
        }

        let n = config.expected_elements as f64;
        let ln2 = std::f64::consts::LN_2;
        let m = (-(n * config.false_positive_rate.ln()) / (ln2 * ln2)).ceil();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bit_count = m as u64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let hash_count = ((m / n) * ln2).ceil() as u32;

        let word_count = usize::try_from(bit_count.div_ceil(64)).map_err(|_| {
            Error::config("bloom filter sizing overflows addressable memory")
        })?;

        Ok(Self {
            words: (0..word_count).map(|_| AtomicU64::new(0)).collect(),
            bit_count,
            hash_count: hash_count.max(1),
            element_count: AtomicUsize::new(0),
            expected_elements: config.expected_elements,
        })
    }

    /// One multiplicative string hash, re-seeded per hash index.
    fn hash(key: &str, seed: u32) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325 ^ u64::from(seed).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        for byte in key.bytes() {
            h ^= u64::from(byte);
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
        h
    }

    fn bit_index(&self, key: &str, seed: u32) -> u64 {
        Self::hash(key, seed) % self.bit_count
    }

    /// Marks `key` as present.
    pub fn add(&self, key: &str) {
        for seed in 0..self.hash_count {
            let bit = self.bit_index(key, seed);
            let word = &self.words[usize::try_from(bit / 64).unwrap_or(0)];
            word.fetch_or(1 << (bit % 64), Ordering::Relaxed);
        }
        self.element_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns false if `key` was definitely never added; true otherwise.
    #[must_use]
    pub fn might_contain(&self, key: &str) -> bool {
        (0..self.hash_count).all(|seed| {
            let bit = self.bit_index(key, seed);
            let word = self.words[usize::try_from(bit / 64).unwrap_or(0)].load(Ordering::Relaxed);
            word & (1 << (bit % 64)) != 0
        })
    }

    /// Zeroes the bit array and the element counter.
    pub fn clear(&self) {
        for word in &self.words {
            word.store(0, Ordering::Relaxed);
        }
        self.element_count.store(0, Ordering::Relaxed);
    }

    /// Returns filter sizing and occupancy statistics.
    #[must_use]
    pub fn stats(&self) -> BloomStats {
        let element_count = self.element_count.load(Ordering::Relaxed);
        let n = element_count as f64;
        let m = self.bit_count as f64;
        let k = f64::from(self.hash_count);

        BloomStats {
            size: self.bit_count,
            hash_count: self.hash_count,
            element_count,
            false_positive_rate: (1.0 - (-k * n / m).exp()).powf(k),
            load_factor: n / self.expected_elements as f64,
        }
    }
}

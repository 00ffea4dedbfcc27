// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The persisted value envelope and its validity predicates.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A tag name paired with the version captured when a record was written.
///
/// Tag versions are epoch-millisecond values. Bumping a tag (via `touch`)
/// sets its current version to "now", which retroactively invalidates every
/// record that captured a strictly smaller version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagVersion {
    /// The tag name as provided by the caller. Never hashed or prefixed.
    pub name: String,
    /// Version captured from the tag store at write time, in epoch ms.
    pub version: u64,
}

impl TagVersion {
    /// Creates a tag-version pair.
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// The unit persisted for a key: serialized payload plus metadata.
///
/// A record is written as a single opaque blob (the JSON encoding of this
/// struct) so that payload, timestamps and the tag snapshot travel together.
/// The payload itself is an already-serialized string the core never
/// inspects.
///
/// # Examples
///
/// ```
/// use cachet_store::Record;
///
/// let record = Record::new("user:1", "{\"id\":1}".to_string(), 1_000, 60_000);
/// assert!(record.is_time_valid(50_000));
/// assert!(!record.is_time_valid(61_001));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The storage key this record was written under.
    pub key: String,
    /// The serialized payload. Opaque to the core.
    pub value: String,
    /// Write timestamp in epoch milliseconds.
    pub created_at: u64,
    /// Lifetime in milliseconds. Ignored when `permanent` is set.
    pub expires_in: u64,
    /// Disables time-based expiration. Tag invalidation still applies.
    pub permanent: bool,
    /// Tag versions captured from the tag store at write time.
    pub tags: Vec<TagVersion>,
}

impl Record {
    /// Creates a record expiring `expires_in` milliseconds after `created_at`.
    pub fn new(key: impl Into<String>, value: String, created_at: u64, expires_in: u64) -> Self {
        Self {
            key: key.into(),
            value,
            created_at,
            expires_in,
            permanent: false,
            tags: Vec::new(),
        }
    }

    /// Creates a record that never expires by time.
    pub fn permanent(key: impl Into<String>, value: String, created_at: u64) -> Self {
        Self {
            key: key.into(),
            value,
            created_at,
            expires_in: 0,
            permanent: true,
            tags: Vec::new(),
        }
    }

    /// Attaches a tag-version snapshot to the record.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<TagVersion>) -> Self {
        self.tags = tags;
        self
    }

    /// Returns true if the record has not passed its time-based lifetime.
    ///
    /// Permanent records are always time-valid; tag invalidation is checked
    /// separately through the storage's staleness query.
    #[must_use]
    pub fn is_time_valid(&self, now_millis: u64) -> bool {
        self.permanent || now_millis <= self.created_at.saturating_add(self.expires_in)
    }

    /// Encodes the record as a single JSON blob for storage.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::from)
    }

    /// Decodes a record from its stored JSON blob.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(Error::from)
    }
}

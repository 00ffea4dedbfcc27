// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Storage contract and record model for the `cachet` caching library.
//!
//! This crate defines the seams every cache backend must satisfy:
//! - [`StorageAdapter`]: the raw string key/value interface a backend exposes,
//!   including the per-key lock primitives used for stampede protection.
//! - [`Storage`]: the record-discipline interface consumed by cache managers,
//!   built on top of an adapter by [`RecordStorage`].
//! - [`Record`]: the persisted envelope (payload, creation time, TTL,
//!   permanence, tag-version snapshot) and its validity predicates.
//! - [`Clock`]: an epoch-millisecond time source that can be frozen and
//!   advanced manually in tests.
//!
//! Backend adapters implement [`StorageAdapter`] only; everything above the
//! adapter (serialization, tag capture, staleness checks, operation timeouts)
//! is provided by [`RecordStorage`].

pub mod adapter;
pub mod clock;
pub mod error;
pub mod record;
pub mod storage;
pub mod tags;
pub mod testing;
mod wrapper;

#[doc(inline)]
pub use adapter::{ConnectionStatus, StorageAdapter};
#[doc(inline)]
pub use clock::Clock;
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use record::{Record, TagVersion};
#[doc(inline)]
pub use storage::{Storage, StorageSettings, WriteOptions};
#[doc(inline)]
pub use tags::TagSource;
#[doc(inline)]
pub use wrapper::RecordStorage;

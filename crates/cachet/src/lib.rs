// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tag-aware caching with stampede protection, refresh-ahead and
//! multi-level tiers.
//!
//! This crate provides a cache façade that sits between an application and
//! one or more slow data sources:
//! - **Disciplines**: read-through, write-through, refresh-ahead, and a
//!   multi-level composition of raw storage tiers, all behind one
//!   [`Manager`] seam.
//! - **Tag invalidation**: records capture tag versions at write time;
//!   touching a tag retroactively invalidates everything that captured an
//!   older version.
//! - **Stampede protection**: at most one executor recomputes a key at a
//!   time, arbitrated by per-key locks in the backing store; contenders
//!   wait for the winner's result or compute without writing.
//! - **Bloom pre-check**: an optional filter short-circuits storage reads
//!   for keys that were definitely never written.
//!
//! # Examples
//!
//! ## Basic Read-Through
//!
//! ```no_run
//! use cachet::{Cache, GetOptions};
//! use cachet_store::Clock;
//! use std::convert::Infallible;
//! use std::time::Duration;
//!
//! # async fn demo() -> cachet_store::Result<()> {
//! let cache = Cache::builder(Clock::new())
//!     .memory()
//!     .default_ttl(Duration::from_secs(300))
//!     .build()?;
//!
//! // Miss: the executor runs and the result is cached.
//! let user: String = cache
//!     .get(
//!         "user:1",
//!         || async { Ok::<_, Infallible>("alice".to_string()) },
//!         GetOptions::new().tags(vec!["users".to_string()]),
//!     )
//!     .await?;
//! assert_eq!(user, "alice");
//!
//! // Touching the tag invalidates the record; the next get recomputes.
//! cache.touch(&["users".to_string()]).await?;
//! # Ok(())
//! # }
//! ```

pub mod bloom;
pub mod builder;
pub mod cache;
pub mod manager;
mod managers;
pub mod options;
mod recompute;
pub mod telemetry;

#[doc(inline)]
pub use bloom::{BloomConfig, BloomFilter, BloomStats};
#[doc(inline)]
pub use builder::CacheBuilder;
#[doc(inline)]
pub use cache::Cache;
#[cfg(feature = "memory")]
#[doc(inline)]
pub use cachet_memory::MemoryAdapter;
#[doc(inline)]
pub use cachet_store::{
    Clock, ConnectionStatus, Error, Record, RecordStorage, Result, Storage, StorageAdapter,
    StorageSettings, TagSource, TagVersion,
};
#[doc(inline)]
pub use manager::{Executor, ExecutorError, Manager};
#[doc(inline)]
pub use managers::{
    FallbackStrategy, LevelConfig, LevelMetrics, LevelStats, MultiLevelManager,
    ReadThroughManager, RefreshAheadManager, WriteThroughManager,
};
#[doc(inline)]
pub use options::{GetOptions, LockedKeyRetrieveStrategy, SetOptions};
#[doc(inline)]
pub use telemetry::{CacheActivity, CacheOperation, CacheTelemetry, TelemetrySnapshot};

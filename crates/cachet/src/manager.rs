// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The caching-discipline trait and the executor thunk it consumes.

use std::{error::Error as StdError, future::Future};

use async_trait::async_trait;
use futures::future::BoxFuture;

use cachet_store::{Record, Result};

use crate::options::{GetOptions, SetOptions};

/// The error type an executor may fail with.
pub type ExecutorError = Box<dyn StdError + Send + Sync>;

/// A caller-supplied value-producing thunk, invoked on miss or staleness.
///
/// The thunk yields the already-serialized payload; the [`Cache`](crate::Cache)
/// façade wraps typed executors and performs serialization at the boundary.
/// It is consumed at most once per call: either on the synchronous recompute
/// path or inside a background refresh task.
pub type Executor = Box<dyn FnOnce() -> BoxFuture<'static, std::result::Result<String, ExecutorError>> + Send>;

/// Boxes a closure into an [`Executor`].
///
/// # Examples
///
/// ```
/// use cachet::manager::executor;
///
/// let exec = executor(|| async { Ok("\"payload\"".to_string()) });
/// # let _ = exec;
/// ```
pub fn executor<F, Fut>(f: F) -> Executor
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<String, ExecutorError>> + Send + 'static,
{
    Box::new(move || -> BoxFuture<'static, std::result::Result<String, ExecutorError>> { Box::pin(f()) })
}

/// A caching discipline.
///
/// Managers own the read/write policy for a keyspace: when to consult the
/// store, when to run the executor, and what gets written back. The cache
/// façade keeps a registry of managers by name and forwards operations to
/// the resolved one. Payloads are already-serialized strings at this level.
#[async_trait]
pub trait Manager: Send + Sync {
    /// The name this manager registers under.
    fn name(&self) -> &str;

    /// Retrieves the value for `key`, running `executor` when the discipline
    /// decides the cached state is unusable.
    async fn get(&self, key: &str, executor: Executor, options: &GetOptions) -> Result<String>;

    /// Writes `value` under `key` according to the discipline.
    async fn set(&self, key: &str, value: String, options: &SetOptions) -> Result<Record>;

    /// Removes `key`. Returns true if something was removed.
    async fn del(&self, key: &str) -> Result<bool>;
}

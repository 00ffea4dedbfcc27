// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache façade: a registry of managers behind a typed surface.

use std::{collections::HashMap, error::Error as StdError, fmt::Write as _, future::Future, sync::Arc, time::Duration};

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use cachet_store::{Error, Record, Result, Storage};

use crate::{
    bloom::BloomFilter,
    builder::CacheBuilder,
    manager::{ExecutorError, Manager},
    options::{GetOptions, SetOptions},
    telemetry::CacheTelemetry,
};

/// The user-facing cache.
///
/// Owns a registry of [`Manager`]s by name, a default storage, and the key
/// discipline (prefixing and hashing). Typed values cross the boundary here:
/// executors and `set` payloads are serialized with `serde_json`, and `get`
/// results are deserialized back.
///
/// # Examples
///
/// ```no_run
/// use cachet::{Cache, GetOptions};
/// use cachet_store::Clock;
/// use std::convert::Infallible;
///
/// # async fn demo() -> cachet_store::Result<()> {
/// let cache = Cache::builder(Clock::new()).memory().build()?;
///
/// let value: String = cache
///     .get(
///         "greeting",
///         || async { Ok::<_, Infallible>("hello".to_string()) },
///         GetOptions::new(),
///     )
///     .await?;
/// assert_eq!(value, "hello");
/// # Ok(())
/// # }
/// ```
pub struct Cache {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) managers: RwLock<HashMap<String, Arc<dyn Manager>>>,
    pub(crate) default_manager: String,
    pub(crate) default_ttl: Option<Duration>,
    pub(crate) prefix: Option<String>,
    pub(crate) hash_keys: bool,
    pub(crate) bloom: Option<Arc<BloomFilter>>,
    pub(crate) telemetry: CacheTelemetry,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("default_manager", &self.default_manager)
            .field("managers", &self.managers.read().keys().collect::<Vec<_>>())
            .field("prefix", &self.prefix)
            .field("hash_keys", &self.hash_keys)
            .finish_non_exhaustive()
    }
}

impl Cache {
    /// Creates a cache builder around the given clock.
    #[must_use]
    pub fn builder(clock: cachet_store::Clock) -> CacheBuilder {
        CacheBuilder::new(clock)
    }

    /// Registers a manager under its own name.
    ///
    /// Registration refuses silent overwrite: if the name is taken, the
    /// already-registered instance is returned and the argument is dropped.
    pub fn register_manager(&self, manager: Arc<dyn Manager>) -> Arc<dyn Manager> {
        let name = manager.name().to_string();
        self.register_manager_as(&name, manager)
    }

    /// Registers a manager under an explicit name, overriding
    /// [`Manager::name`]. Same overwrite policy as
    /// [`register_manager`](Self::register_manager).
    pub fn register_manager_as(&self, name: &str, manager: Arc<dyn Manager>) -> Arc<dyn Manager> {
        let mut managers = self.managers.write();
        match managers.entry(name.to_string()) {
            std::collections::hash_map::Entry::Occupied(existing) => Arc::clone(existing.get()),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&manager));
                manager
            }
        }
    }

    /// Retrieves the value for `key`, computing it through `executor` when
    /// the resolved manager decides the cached state is unusable.
    ///
    /// # Errors
    ///
    /// Surfaces executor failures, multi-level misses under the `Fail`
    /// fallback, unknown manager names, and payload serialization failures.
    /// Transient storage failures never surface from reads; they degrade to
    /// a recompute.
    pub async fn get<V, E, F, Fut>(&self, key: &str, executor: F, options: GetOptions) -> Result<V>
    where
        V: Serialize + DeserializeOwned + Send + 'static,
        E: StdError + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        let mut options = options;
        options.expires_in = options.expires_in.or(self.default_ttl);
        let manager = self.resolve_manager(options.manager.as_deref())?;
        let key = self.full_key(key);

        let boxed = crate::manager::executor(move || async move {
            let value = executor().await.map_err(|e| Box::new(e) as ExecutorError)?;
            serde_json::to_string(&value).map_err(|e| Box::new(e) as ExecutorError)
        });

        let raw = manager
            .get(&key, boxed, &options)
            .await
            .map_err(reclassify_executor_error)?;
        serde_json::from_str(&raw).map_err(Error::from)
    }

    /// Writes `value` under `key` through the resolved manager.
    ///
    /// Returns the record envelope actually written (or synthesized, for
    /// the multi-level discipline).
    pub async fn set<V>(&self, key: &str, value: &V, options: SetOptions) -> Result<Record>
    where
        V: Serialize + ?Sized,
    {
        let mut options = options;
        options.expires_in = options.expires_in.or(self.default_ttl);
        let manager = self.resolve_manager(options.manager.as_deref())?;
        let raw = serde_json::to_string(value)?;
        manager.set(&self.full_key(key), raw, &options).await
    }

    /// Advances every named tag's version, invalidating all records that
    /// captured an older version. Tag names are never prefixed or hashed.
    pub async fn touch(&self, tags: &[String]) -> Result<()> {
        self.storage.touch(tags).await
    }

    /// Removes `key` through the default manager.
    pub async fn del(&self, key: &str) -> Result<bool> {
        let manager = self.resolve_manager(None)?;
        manager.del(&self.full_key(key)).await
    }

    /// Returns the default storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Returns the shared bloom filter, when the pre-check is enabled.
    #[must_use]
    pub fn bloom_filter(&self) -> Option<&Arc<BloomFilter>> {
        self.bloom.as_ref()
    }

    /// Returns the telemetry shared by every registered manager.
    #[must_use]
    pub fn telemetry(&self) -> &CacheTelemetry {
        &self.telemetry
    }

    fn resolve_manager(&self, name: Option<&str>) -> Result<Arc<dyn Manager>> {
        let name = name.unwrap_or(&self.default_manager);
        self.managers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::config(format!("unknown manager {name:?}")))
    }

    fn full_key(&self, key: &str) -> String {
        let hashed;
        let key = if self.hash_keys {
            hashed = hex_digest(key);
            hashed.as_str()
        } else {
            key
        };
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }
}

/// Bounds key length with a deterministic digest.
fn hex_digest(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Serialization failures inside the boxed executor surface as executor
/// errors; pull them back out into the serialization kind.
fn reclassify_executor_error(error: Error) -> Error {
    match error {
        Error::Executor(cause) => match cause.downcast::<serde_json::Error>() {
            Ok(serde_error) => Error::Serialization(*serde_error),
            Err(cause) => Error::Executor(cause),
        },
        other => other,
    }
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock adapter for testing.
//!
//! This module provides [`MockAdapter`], a configurable in-memory backend
//! that records all operations and supports failure injection for testing
//! error paths. TTLs are accepted but not enforced; record validity is
//! evaluated from the envelope, so the mock stays deterministic.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    adapter::{ConnectionStatus, StorageAdapter},
    error::{Error, Result},
};

/// Recorded adapter operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterOp {
    /// A get was performed with the given key.
    Get(String),
    /// A set was performed with the given key and raw value.
    Set {
        /// The key that was written.
        key: String,
        /// The raw value that was written.
        value: String,
    },
    /// A del was performed with the given key.
    Del(String),
    /// A lock acquisition was attempted for the given key.
    AcquireLock(String),
    /// A lock release was attempted for the given key.
    ReleaseLock(String),
}

type FailPredicate = Box<dyn Fn(&AdapterOp) -> bool + Send + Sync>;

/// A configurable mock backend for testing.
///
/// Stores values in memory, records every operation, and can be configured
/// to fail operations on demand via [`fail_when`](MockAdapter::fail_when).
///
/// # Examples
///
/// ```no_run
/// use cachet_store::testing::{AdapterOp, MockAdapter};
/// use cachet_store::StorageAdapter;
///
/// # async fn example() -> cachet_store::Result<()> {
/// let adapter = MockAdapter::new();
///
/// adapter.set("key", "value", None).await?;
/// assert_eq!(adapter.get("key").await?, Some("value".to_string()));
///
/// // Fail only gets for a specific key
/// adapter.fail_when(|op| matches!(op, AdapterOp::Get(k) if k == "forbidden"));
/// assert!(adapter.get("forbidden").await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MockAdapter {
    data: Arc<Mutex<HashMap<String, String>>>,
    locks: Arc<Mutex<HashSet<String>>>,
    operations: Arc<Mutex<Vec<AdapterOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
    status: Arc<Mutex<ConnectionStatus>>,
}

impl std::fmt::Debug for MockAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAdapter")
            .field("data", &self.data)
            .field("locks", &self.locks)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl Clone for MockAdapter {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            locks: Arc::clone(&self.locks),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
            status: Arc::clone(&self.status),
        }
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    /// Creates a new empty mock adapter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            locks: Arc::new(Mutex::new(HashSet::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
            status: Arc::new(Mutex::new(ConnectionStatus::Connected)),
        }
    }

    /// Sets a predicate that determines when operations should fail.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&AdapterOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<AdapterOp> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Returns the raw value stored at `key` without recording a get.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.data.lock().get(key).cloned()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Overrides the reported connection status.
    pub fn set_connection_status(&self, status: ConnectionStatus) {
        *self.status.lock() = status;
    }

    fn record(&self, op: AdapterOp) {
        self.operations.lock().push(op);
    }

    fn check(&self, op: &AdapterOp) -> Result<()> {
        let should_fail = self.fail_when.lock().as_ref().is_some_and(|p| p(op));
        if should_fail {
            Err(Error::storage(format!("mock: operation failed: {op:?}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageAdapter for MockAdapter {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let op = AdapterOp::Get(key.to_string());
        self.record(op.clone());
        self.check(&op)?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<bool> {
        let op = AdapterOp::Set {
            key: key.to_string(),
            value: value.to_string(),
        };
        self.record(op.clone());
        self.check(&op)?;
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let op = AdapterOp::Del(key.to_string());
        self.record(op.clone());
        self.check(&op)?;
        Ok(self.data.lock().remove(key).is_some())
    }

    async fn acquire_lock(&self, key: &str) -> Result<bool> {
        let op = AdapterOp::AcquireLock(key.to_string());
        self.record(op.clone());
        self.check(&op)?;
        Ok(self.locks.lock().insert(key.to_string()))
    }

    async fn release_lock(&self, key: &str) -> Result<bool> {
        let op = AdapterOp::ReleaseLock(key.to_string());
        self.record(op.clone());
        self.check(&op)?;
        Ok(self.locks.lock().remove(key))
    }

    async fn is_lock_exists(&self, key: &str) -> Result<bool> {
        Ok(self.locks.lock().contains(key))
    }

    fn connection_status(&self) -> ConnectionStatus {
        *self.status.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    #[test]
    fn records_operations_in_order() {
        block_on(async {
            let adapter = MockAdapter::new();

            adapter.set("k", "v", None).await.expect("set failed");
            adapter.get("k").await.expect("get failed");
            adapter.del("k").await.expect("del failed");

            assert_eq!(
                adapter.operations(),
                vec![
                    AdapterOp::Set {
                        key: "k".to_string(),
                        value: "v".to_string()
                    },
                    AdapterOp::Get("k".to_string()),
                    AdapterOp::Del("k".to_string()),
                ]
            );
        });
    }

    #[test]
    fn fail_when_targets_matching_operations() {
        block_on(async {
            let adapter = MockAdapter::new();
            adapter.fail_when(|op| matches!(op, AdapterOp::Get(k) if k == "bad"));

            adapter.set("bad", "v", None).await.expect("set should pass");
            assert!(adapter.get("bad").await.is_err());
            assert!(adapter.get("good").await.is_ok());

            adapter.clear_failures();
            assert!(adapter.get("bad").await.is_ok());
        });
    }

    #[test]
    fn lock_is_exclusive_until_released() {
        block_on(async {
            let adapter = MockAdapter::new();

            assert!(adapter.acquire_lock("k").await.expect("acquire failed"));
            assert!(!adapter.acquire_lock("k").await.expect("acquire failed"));
            assert!(adapter.is_lock_exists("k").await.expect("check failed"));

            assert!(adapter.release_lock("k").await.expect("release failed"));
            assert!(adapter.acquire_lock("k").await.expect("acquire failed"));
        });
    }

    #[test]
    fn clones_share_state() {
        block_on(async {
            let adapter = MockAdapter::new();
            let clone = adapter.clone();

            adapter.set("k", "v", None).await.expect("set failed");
            assert_eq!(clone.peek("k"), Some("v".to_string()));
        });
    }
}

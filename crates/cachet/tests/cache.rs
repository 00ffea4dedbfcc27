// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the cache façade and the read-through discipline.

use std::{
    convert::Infallible,
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use cachet::{Cache, Error, GetOptions, ReadThroughManager, SetOptions, Storage};
use cachet_store::{testing::MockAdapter, Clock, Record, RecordStorage};
use serde_json::{json, Value};

fn cache_over(adapter: MockAdapter, clock: Clock) -> Cache {
    Cache::builder(clock.clone())
        .storage(Arc::new(RecordStorage::new(adapter, clock)))
        .default_ttl(Duration::from_secs(60))
        .build()
        .expect("build failed")
}

fn never_runs() -> impl std::future::Future<Output = Result<Value, io::Error>> {
    async { Err(io::Error::other("executor must not run")) }
}

#[tokio::test]
async fn read_through_caches_the_executor_result() {
    let cache = cache_over(MockAdapter::new(), Clock::new_frozen_at(0));
    let calls = Arc::new(AtomicUsize::new(0));

    let counted = Arc::clone(&calls);
    let value: Value = cache
        .get(
            "u:1",
            move || async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(json!({"id": 1, "name": "A"}))
            },
            GetOptions::new(),
        )
        .await
        .expect("get failed");
    assert_eq!(value, json!({"id": 1, "name": "A"}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Second read is served from cache; a throwing executor proves it.
    let value: Value = cache
        .get("u:1", never_runs, GetOptions::new())
        .await
        .expect("get failed");
    assert_eq!(value, json!({"id": 1, "name": "A"}));
}

#[tokio::test]
async fn touch_invalidates_tagged_records() {
    let clock = Clock::new_frozen_at(1_000);
    let cache = cache_over(MockAdapter::new(), clock.clone());

    cache
        .set(
            "u:1",
            &json!({"v": 1}),
            SetOptions::new().tags(vec!["users".to_string()]),
        )
        .await
        .expect("set failed");

    clock.advance(Duration::from_millis(1));
    cache.touch(&["users".to_string()]).await.expect("touch failed");

    let value: Value = cache
        .get(
            "u:1",
            || async { Ok::<_, Infallible>(json!({"v": 2})) },
            GetOptions::new(),
        )
        .await
        .expect("get failed");
    assert_eq!(value, json!({"v": 2}));

    // The recomputed value was stored.
    let record = cache
        .storage()
        .get("u:1")
        .await
        .expect("storage get failed")
        .expect("record missing");
    assert_eq!(record.value, json!({"v": 2}).to_string());
}

#[tokio::test]
async fn expired_records_are_recomputed() {
    let clock = Clock::new_frozen_at(0);
    let cache = cache_over(MockAdapter::new(), clock.clone());

    let first: Value = cache
        .get(
            "k",
            || async { Ok::<_, Infallible>(json!("old")) },
            GetOptions::new().expires_in(Duration::from_millis(100)),
        )
        .await
        .expect("get failed");
    assert_eq!(first, json!("old"));

    clock.advance(Duration::from_millis(101));

    let second: Value = cache
        .get(
            "k",
            || async { Ok::<_, Infallible>(json!("new")) },
            GetOptions::new().expires_in(Duration::from_millis(100)),
        )
        .await
        .expect("get failed");
    assert_eq!(second, json!("new"));
}

#[tokio::test]
async fn executor_failure_propagates_and_releases_the_lock() {
    let cache = cache_over(MockAdapter::new(), Clock::new_frozen_at(0));

    let err = cache
        .get::<Value, _, _, _>("k", never_runs, GetOptions::new())
        .await
        .expect_err("should fail");
    assert!(matches!(err, Error::Executor(_)));

    assert!(!cache
        .storage()
        .key_is_locked("k")
        .await
        .expect("lock check failed"));

    // The key is usable again immediately.
    let value: Value = cache
        .get(
            "k",
            || async { Ok::<_, Infallible>(json!(1)) },
            GetOptions::new(),
        )
        .await
        .expect("get failed");
    assert_eq!(value, json!(1));
}

#[tokio::test]
async fn storage_failures_degrade_reads_to_the_executor() {
    let adapter = MockAdapter::new();
    adapter.fail_when(|_| true);
    let cache = cache_over(adapter, Clock::new_frozen_at(0));

    // Storage is completely down; correctness is preserved at the cost of
    // a cache-miss latency.
    let value: Value = cache
        .get(
            "k",
            || async { Ok::<_, Infallible>(json!("computed")) },
            GetOptions::new(),
        )
        .await
        .expect("get failed");
    assert_eq!(value, json!("computed"));
}

#[tokio::test]
async fn unknown_manager_is_a_configuration_error() {
    let cache = cache_over(MockAdapter::new(), Clock::new_frozen_at(0));

    let err = cache
        .get::<Value, _, _, _>("k", never_runs, GetOptions::new().manager("nope"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn duplicate_registration_returns_the_existing_instance() {
    let adapter = MockAdapter::new();
    let clock = Clock::new_frozen_at(0);
    let cache = cache_over(adapter, clock.clone());

    let storage: Arc<dyn Storage> =
        Arc::new(RecordStorage::new(MockAdapter::new(), clock));
    let replacement: Arc<dyn cachet::Manager> = Arc::new(ReadThroughManager::new(storage));

    // "read-through" is already registered by the builder; the duplicate is
    // refused and the existing instance comes back.
    let registered = cache.register_manager(Arc::clone(&replacement));
    assert!(!Arc::ptr_eq(&registered, &replacement));
}

#[tokio::test]
async fn prefix_is_applied_to_storage_keys() {
    let adapter = MockAdapter::new();
    let clock = Clock::new_frozen_at(0);
    let cache = Cache::builder(clock.clone())
        .storage(Arc::new(RecordStorage::new(adapter.clone(), clock)))
        .prefix("app")
        .build()
        .expect("build failed");

    cache.set("k", &json!(1), SetOptions::new()).await.expect("set failed");

    assert!(adapter.peek("app:k").is_some());
    assert!(adapter.peek("k").is_none());
}

#[tokio::test]
async fn hashed_keys_are_bounded_digests() {
    let adapter = MockAdapter::new();
    let clock = Clock::new_frozen_at(0);
    let cache = Cache::builder(clock.clone())
        .storage(Arc::new(RecordStorage::new(adapter.clone(), clock)))
        .hash_keys()
        .build()
        .expect("build failed");

    let very_long_key = "k".repeat(4_096);
    cache
        .set(&very_long_key, &json!(1), SetOptions::new())
        .await
        .expect("set failed");

    assert!(adapter.peek(&very_long_key).is_none());
    let stored_key = adapter
        .operations()
        .into_iter()
        .find_map(|op| match op {
            cachet_store::testing::AdapterOp::Set { key, .. } if !key.starts_with("tag:") => {
                Some(key)
            }
            _ => None,
        })
        .expect("no record write observed");
    assert_eq!(stored_key.len(), 64);
}

#[tokio::test]
async fn undecodable_payloads_surface_as_serialization_errors() {
    let cache = cache_over(MockAdapter::new(), Clock::new_frozen_at(0));

    // A fresh record whose payload is not valid JSON for the requested type.
    cache
        .storage()
        .set("k", "not-json".to_string(), &cachet_store::WriteOptions::new())
        .await
        .expect("set failed");

    let err = cache
        .get::<u32, _, _, _>(
            "k",
            || async { Ok::<_, Infallible>(7) },
            GetOptions::new(),
        )
        .await
        .expect_err("should fail");
    assert!(matches!(err, Error::Serialization(_)));
}

#[tokio::test]
async fn del_forwards_to_the_default_manager() {
    let cache = cache_over(MockAdapter::new(), Clock::new_frozen_at(0));

    cache.set("k", &json!(1), SetOptions::new()).await.expect("set failed");
    assert!(cache.del("k").await.expect("del failed"));
    assert!(!cache.del("k").await.expect("del failed"));

    let record = cache.storage().get("k").await.expect("get failed");
    assert!(record.is_none());
}

#[tokio::test]
async fn set_returns_the_written_envelope() {
    let cache = cache_over(MockAdapter::new(), Clock::new_frozen_at(9_000));

    let record: Record = cache
        .set(
            "k",
            &json!({"a": 1}),
            SetOptions::new().expires_in(Duration::from_secs(5)),
        )
        .await
        .expect("set failed");

    assert_eq!(record.created_at, 9_000);
    assert_eq!(record.expires_in, 5_000);
    assert_eq!(record.value, json!({"a": 1}).to_string());
}

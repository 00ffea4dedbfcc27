// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the record/tag discipline over a raw adapter.

use std::time::Duration;

use cachet_store::{
    testing::MockAdapter, Clock, Error, Record, RecordStorage, Storage, StorageAdapter,
    StorageSettings, WriteOptions,
};

fn storage_at(epoch_millis: u64) -> (RecordStorage<MockAdapter>, MockAdapter, Clock) {
    let adapter = MockAdapter::new();
    let clock = Clock::new_frozen_at(epoch_millis);
    let storage = RecordStorage::new(adapter.clone(), clock.clone());
    (storage, adapter, clock)
}

#[tokio::test]
async fn set_writes_a_single_envelope_blob() {
    let (storage, adapter, _) = storage_at(1_000);

    let record = storage
        .set(
            "user:1",
            "{\"id\":1}".to_string(),
            &WriteOptions::new().expires_in(Duration::from_secs(60)),
        )
        .await
        .expect("set failed");

    assert_eq!(record.created_at, 1_000);
    assert_eq!(record.expires_in, 60_000);
    assert!(!record.permanent);

    let blob = adapter.peek("user:1").expect("record blob missing");
    let decoded = Record::from_json(&blob).expect("decode failed");
    assert_eq!(decoded, record);
}

#[tokio::test]
async fn set_captures_tag_versions_and_vacuum_fills() {
    let (storage, adapter, _) = storage_at(5_000);

    let record = storage
        .set(
            "user:1",
            "{}".to_string(),
            &WriteOptions::new().tags(vec!["users".to_string(), "acl".to_string()]),
        )
        .await
        .expect("set failed");

    // Both tags were unknown, so they were created at "now" and captured.
    assert_eq!(record.tags.len(), 2);
    assert!(record.tags.iter().all(|t| t.version == 5_000));
    assert_eq!(adapter.peek("tag:users"), Some("5000".to_string()));
    assert_eq!(adapter.peek("tag:acl"), Some("5000".to_string()));
}

#[tokio::test]
async fn tag_producer_is_resolved_at_write_time() {
    let (storage, _, _) = storage_at(0);

    let options = WriteOptions::new().tags(cachet_store::TagSource::producer(|| {
        vec!["derived".to_string()]
    }));
    let record = storage
        .set("k", "v".to_string(), &options)
        .await
        .expect("set failed");

    assert_eq!(record.tags.len(), 1);
    assert_eq!(record.tags[0].name, "derived");
}

#[tokio::test]
async fn touch_advances_versions_and_outdates_records() {
    let (storage, _, clock) = storage_at(1_000);

    let record = storage
        .set(
            "user:1",
            "{}".to_string(),
            &WriteOptions::new().tags(vec!["users".to_string()]),
        )
        .await
        .expect("set failed");
    assert!(!storage.is_outdated(&record).await.expect("check failed"));

    clock.advance(Duration::from_millis(500));
    storage
        .touch(&["users".to_string()])
        .await
        .expect("touch failed");

    assert!(storage.is_outdated(&record).await.expect("check failed"));
}

#[tokio::test]
async fn missing_tag_does_not_outdate_a_record() {
    let (storage, adapter, _) = storage_at(1_000);

    let record = storage
        .set(
            "user:1",
            "{}".to_string(),
            &WriteOptions::new().tags(vec!["users".to_string()]),
        )
        .await
        .expect("set failed");

    // Simulate the tag entry being evicted from the backend.
    adapter.del("tag:users").await.expect("del failed");

    assert!(!storage.is_outdated(&record).await.expect("check failed"));
}

#[tokio::test]
async fn permanent_write_carries_no_ttl() {
    let (storage, _, _) = storage_at(0);

    let record = storage
        .set("k", "v".to_string(), &WriteOptions::new().permanent())
        .await
        .expect("set failed");

    assert!(record.permanent);
    assert!(record.is_time_valid(u64::MAX));
}

#[tokio::test]
async fn default_ttl_applies_when_unspecified() {
    let adapter = MockAdapter::new();
    let storage = RecordStorage::new(adapter, Clock::new_frozen_at(0)).with_settings(
        StorageSettings {
            default_ttl: Duration::from_secs(10),
            ..StorageSettings::default()
        },
    );

    let record = storage
        .set("k", "v".to_string(), &WriteOptions::new())
        .await
        .expect("set failed");
    assert_eq!(record.expires_in, 10_000);
}

#[tokio::test]
async fn get_decodes_the_stored_envelope() {
    let (storage, _, _) = storage_at(2_000);

    storage
        .set("k", "payload".to_string(), &WriteOptions::new())
        .await
        .expect("set failed");

    let record = storage
        .get("k")
        .await
        .expect("get failed")
        .expect("record missing");
    assert_eq!(record.value, "payload");
    assert_eq!(record.created_at, 2_000);
}

#[tokio::test]
async fn get_surfaces_undecodable_blobs_as_serialization_errors() {
    let (storage, adapter, _) = storage_at(0);

    adapter.set("k", "not json", None).await.expect("set failed");

    let err = storage.get("k").await.expect_err("should fail");
    assert!(matches!(err, Error::Serialization(_)));
}

#[tokio::test(start_paused = true)]
async fn slow_adapter_calls_time_out_as_transient_failures() {
    struct StuckAdapter;

    #[async_trait::async_trait]
    impl StorageAdapter for StuckAdapter {
        async fn get(&self, _key: &str) -> cachet_store::Result<Option<String>> {
            std::future::pending().await
        }
        async fn set(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Option<Duration>,
        ) -> cachet_store::Result<bool> {
            std::future::pending().await
        }
        async fn del(&self, _key: &str) -> cachet_store::Result<bool> {
            std::future::pending().await
        }
        async fn acquire_lock(&self, _key: &str) -> cachet_store::Result<bool> {
            std::future::pending().await
        }
        async fn release_lock(&self, _key: &str) -> cachet_store::Result<bool> {
            std::future::pending().await
        }
        async fn is_lock_exists(&self, _key: &str) -> cachet_store::Result<bool> {
            std::future::pending().await
        }
    }

    let storage = RecordStorage::new(StuckAdapter, Clock::new_frozen());

    let err = storage.get("k").await.expect_err("should time out");
    assert!(matches!(err, Error::Timeout(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn lock_primitives_pass_through_to_the_adapter() {
    let (storage, _, _) = storage_at(0);

    assert!(storage.lock_key("k").await.expect("lock failed"));
    assert!(storage.key_is_locked("k").await.expect("check failed"));
    assert!(!storage.lock_key("k").await.expect("lock failed"));

    assert!(storage.release_key("k").await.expect("release failed"));
    assert!(!storage.key_is_locked("k").await.expect("check failed"));
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the bloom pre-check.

use std::{convert::Infallible, sync::Arc, time::Duration};

use cachet::{BloomConfig, BloomFilter, Cache, GetOptions, SetOptions, Storage};
use cachet_store::{testing::MockAdapter, Clock, RecordStorage, WriteOptions};
use serde_json::{json, Value};

#[test]
fn unseen_keys_are_almost_always_rejected() {
    let filter = BloomFilter::new(BloomConfig {
        expected_elements: 10_000,
        false_positive_rate: 0.01,
    })
    .expect("construction failed");

    filter.add("alpha");

    let rejected = (0..1_000)
        .filter(|i| !filter.might_contain(&format!("unseen-{i}")))
        .count();
    assert!(
        rejected >= 950,
        "expected at least 95% definite negatives, got {rejected}/1000"
    );
}

#[test]
fn false_positive_rate_stays_near_the_sized_for_target() {
    let filter = BloomFilter::new(BloomConfig {
        expected_elements: 10_000,
        false_positive_rate: 0.01,
    })
    .expect("construction failed");

    // Fill to capacity.
    for i in 0..10_000 {
        filter.add(&format!("member-{i}"));
    }

    let false_positives = (0..1_000)
        .filter(|i| filter.might_contain(&format!("outsider-{i}")))
        .count();
    // Sized for 1%; allow generous slack for hash quality.
    assert!(
        false_positives <= 100,
        "false positive count {false_positives}/1000 is far above the 1% target"
    );
}

fn bloom_cache(adapter: MockAdapter, clock: Clock) -> Cache {
    Cache::builder(clock.clone())
        .storage(Arc::new(RecordStorage::new(adapter, clock)))
        .default_ttl(Duration::from_secs(60))
        .bloom_filter(BloomConfig::default())
        .build()
        .expect("build failed")
}

#[tokio::test]
async fn negative_answers_skip_the_storage_read() {
    let adapter = MockAdapter::new();
    let cache = bloom_cache(adapter.clone(), Clock::new_frozen_at(0));

    // Seed the store behind the filter's back: the filter never saw the key.
    cache
        .storage()
        .set("ghost", "\"stored\"".to_string(), &WriteOptions::new())
        .await
        .expect("seed failed");
    adapter.clear_operations();

    let value: Value = cache
        .get(
            "ghost",
            || async { Ok::<_, Infallible>(json!("computed")) },
            GetOptions::new(),
        )
        .await
        .expect("get failed");

    // The pre-check short-circuited straight to the executor branch: the
    // stored value was never read.
    assert_eq!(value, json!("computed"));
    assert!(!adapter
        .operations()
        .iter()
        .any(|op| matches!(op, cachet_store::testing::AdapterOp::Get(k) if k == "ghost")));
}

#[tokio::test]
async fn recomputed_keys_enter_the_filter() {
    let cache = bloom_cache(MockAdapter::new(), Clock::new_frozen_at(0));

    let value: Value = cache
        .get(
            "k",
            || async { Ok::<_, Infallible>(json!(1)) },
            GetOptions::new(),
        )
        .await
        .expect("get failed");
    assert_eq!(value, json!(1));

    // The write-back registered the key; the next read is a storage hit.
    let filter = cache.bloom_filter().expect("filter missing");
    assert!(filter.might_contain("k"));

    let value: Value = cache
        .get(
            "k",
            || async { Ok::<_, Infallible>(json!(2)) },
            GetOptions::new(),
        )
        .await
        .expect("get failed");
    assert_eq!(value, json!(1));
}

#[tokio::test]
async fn explicit_sets_enter_the_filter() {
    let cache = bloom_cache(MockAdapter::new(), Clock::new_frozen_at(0));

    cache
        .set("k", &json!("stored"), SetOptions::new())
        .await
        .expect("set failed");

    let filter = cache.bloom_filter().expect("filter missing");
    assert!(filter.might_contain("k"));

    let value: Value = cache
        .get(
            "k",
            || async { Ok::<_, Infallible>(json!("recomputed")) },
            GetOptions::new(),
        )
        .await
        .expect("get failed");
    assert_eq!(value, json!("stored"));
}

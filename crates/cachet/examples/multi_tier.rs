// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Two memory tiers with warm-up and per-tier metrics.

use std::{sync::Arc, time::Duration};

use cachet::{manager::executor, GetOptions, LevelConfig, Manager, MultiLevelManager};
use cachet_memory::MemoryAdapter;
use cachet_store::{Clock, StorageAdapter};

#[tokio::main]
async fn main() -> cachet_store::Result<()> {
    let l1 = Arc::new(MemoryAdapter::new());
    let l2 = Arc::new(MemoryAdapter::new());

    // Pretend a slower shared tier already holds the value.
    l2.set("config", "\"remote\"", None).await?;

    let tiers = MultiLevelManager::new(
        vec![
            LevelConfig::new("l1", l1.clone(), 0).ttl(Duration::from_secs(30)),
            LevelConfig::new("l2", l2, 1),
        ],
        Clock::new(),
    )?;

    // The L2 hit warms L1 on the way out.
    let value = tiers
        .get(
            "config",
            executor(|| async { Ok("\"fallback\"".to_string()) }),
            &GetOptions::new(),
        )
        .await?;
    println!("value: {value}");
    println!("l1 now holds: {:?}", l1.get("config").await?);

    for metrics in tiers.metrics() {
        println!(
            "{}: hits={} misses={} sets={}",
            metrics.name, metrics.hits, metrics.misses, metrics.sets
        );
    }

    Ok(())
}

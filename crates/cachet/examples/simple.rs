// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Basic read-through caching against an in-memory store.

use std::{convert::Infallible, time::Duration};

use cachet::{Cache, GetOptions};
use cachet_store::Clock;

#[tokio::main]
async fn main() -> cachet_store::Result<()> {
    let cache = Cache::builder(Clock::new())
        .memory()
        .default_ttl(Duration::from_secs(60))
        .build()?;

    // Miss: the executor runs and the result is written back.
    let user: String = cache
        .get(
            "user:1",
            || async { Ok::<_, Infallible>("alice".to_string()) },
            GetOptions::new().tags(vec!["users".to_string()]),
        )
        .await?;
    println!("first read:  {user}");

    // Hit: the executor is not consulted.
    let user: String = cache
        .get(
            "user:1",
            || async { Ok::<_, Infallible>("bob".to_string()) },
            GetOptions::new(),
        )
        .await?;
    println!("second read: {user}");

    // Touching the tag invalidates the record and the next read recomputes.
    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.touch(&["users".to_string()]).await?;
    let user: String = cache
        .get(
            "user:1",
            || async { Ok::<_, Infallible>("carol".to_string()) },
            GetOptions::new(),
        )
        .await?;
    println!("after touch: {user}");

    Ok(())
}

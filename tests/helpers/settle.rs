//! Bounded waiting on engine messages.

// Shared across test binaries; not every binary uses every function.
#![allow(dead_code)]

use std::time::Duration;

use async_tagger::{AsyncTagger, TagSource};

/// Upper bound for any single wait; real timers in these tests are a few ms.
pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Apply messages until the engine is idle, failing the test on timeout.
pub async fn settle<S: TagSource>(engine: &mut AsyncTagger<S>) {
    tokio::time::timeout(WAIT_LIMIT, engine.settle())
        .await
        .expect("engine did not settle in time");
}

/// Apply exactly one message, failing the test on timeout.
pub async fn next_message<S: TagSource>(engine: &mut AsyncTagger<S>) {
    tokio::time::timeout(WAIT_LIMIT, engine.next_message())
        .await
        .expect("no engine message arrived in time");
}

/// Apply messages until a computation is running.
pub async fn until_in_flight<S: TagSource>(engine: &mut AsyncTagger<S>) {
    while !engine.has_in_flight() {
        next_message(engine).await;
    }
}

/// Poll `predicate` every few milliseconds until it holds.
pub async fn wait_for(mut predicate: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while !predicate() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

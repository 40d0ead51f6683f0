//! Integration tests for the Redis counter store.
//!
//! These tests require a Redis instance running at `redis://127.0.0.1/`.
//! Tests are ignored by default - run with `cargo test --test redis_store -- --ignored`

use std::sync::Arc;

use gatekeeper::ratelimit::{
    ClientIdentity, CounterStore, RedisCounterStore, WindowKey, MAX_WINDOW_SECONDS,
};

const REDIS_URL: &str = "redis://127.0.0.1/";

/// Connect, or `None` when Redis is not running.
async fn connect() -> Option<RedisCounterStore> {
    match RedisCounterStore::connect(REDIS_URL).await {
        Ok(store) => Some(store),
        Err(e) => {
            eprintln!("Skipping test: Redis not available at {}: {}", REDIS_URL, e);
            None
        }
    }
}

/// A key unique to this test run.
fn unique_key(test_name: &str) -> WindowKey {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    WindowKey::for_identity(
        &format!("gatekeeper-test:{}", test_name),
        &ClientIdentity::network_address(nanos.to_string()),
    )
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_first_charge_arms_ttl() {
    let Some(store) = connect().await else { return };
    let key = unique_key("arms_ttl");

    assert!(!store.exists(&key).await.unwrap());

    let outcome = store.charge_if_under_limit(&key, 2, 10, 30).await.unwrap();
    assert!(outcome.allowed);
    assert_eq!(outcome.new_count, 2);
    assert!(outcome.ttl_seconds > 0 && outcome.ttl_seconds <= 30);

    assert_eq!(store.get(&key).await.unwrap(), Some(2));
    let ttl = store.ttl(&key).await.unwrap().unwrap();
    assert!(ttl > 0 && ttl <= 30);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_denial_does_not_charge() {
    let Some(store) = connect().await else { return };
    let key = unique_key("denial");

    store.charge_if_under_limit(&key, 4, 5, 30).await.unwrap();
    let outcome = store.charge_if_under_limit(&key, 2, 5, 30).await.unwrap();

    assert!(!outcome.allowed);
    assert_eq!(outcome.new_count, 4);
    assert_eq!(store.get(&key).await.unwrap(), Some(4));
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_oversized_cost_arms_empty_window() {
    let Some(store) = connect().await else { return };
    let key = unique_key("oversized");

    let outcome = store.charge_if_under_limit(&key, 6, 5, 30).await.unwrap();

    assert!(!outcome.allowed);
    assert_eq!(store.get(&key).await.unwrap(), Some(0));
    assert!(store.ttl(&key).await.unwrap().is_some());
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_huge_window_is_capped() {
    let Some(store) = connect().await else { return };
    let key = unique_key("huge_window");

    let outcome = store.charge_if_under_limit(&key, 1, 10, u64::MAX).await.unwrap();

    assert!(outcome.allowed);
    assert!(outcome.ttl_seconds > 0 && outcome.ttl_seconds <= MAX_WINDOW_SECONDS);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_absent_key_diagnostics() {
    let Some(store) = connect().await else { return };
    let key = unique_key("absent");

    assert_eq!(store.get(&key).await.unwrap(), None);
    assert_eq!(store.ttl(&key).await.unwrap(), None);
    assert!(!store.exists(&key).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires Redis
async fn test_redis_concurrent_charges_respect_limit() {
    let Some(store) = connect().await else { return };
    let store = Arc::new(store);
    let key = unique_key("concurrent");

    let tasks: Vec<_> = (0..100)
        .map(|_| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move { store.charge_if_under_limit(&key, 1, 25, 30).await })
        })
        .collect();

    let granted = futures::future::join_all(tasks)
        .await
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(outcome)) if outcome.allowed))
        .count();

    assert_eq!(granted, 25);
    assert_eq!(store.get(&key).await.unwrap(), Some(25));
}

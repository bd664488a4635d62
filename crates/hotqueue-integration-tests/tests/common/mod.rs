//! Common test utilities for HotQueue integration tests
//!
//! The tests talk to a real Redis server. Point `HOTQUEUE_TEST_REDIS_URL` at
//! it (defaults to `redis://127.0.0.1:6379/15`) and run with `--ignored`.

use hotqueue::{HotQueue, JsonSerializer, RedisConfig, StoreConfig};
use serde::{Deserialize, Serialize};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Redis server used by the integration tests
pub fn redis_url() -> String {
    std::env::var("HOTQUEUE_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string())
}

pub fn redis_config() -> StoreConfig {
    StoreConfig::Redis(RedisConfig::from_url(redis_url()))
}

/// Install a test log subscriber once per test binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Connect to the `testqueue` queue and start from an empty list
pub async fn cleared_queue<T>() -> HotQueue<T>
where
    hotqueue::BincodeSerializer: hotqueue::Serializer<T>,
{
    init_tracing();
    let queue = HotQueue::connect("testqueue", &redis_config())
        .await
        .expect("Redis must be reachable at HOTQUEUE_TEST_REDIS_URL");
    queue.clear().await.expect("failed to clear test queue");
    queue
}

#[allow(dead_code)]
pub async fn cleared_json_queue<T>(name: &str) -> HotQueue<T, JsonSerializer>
where
    JsonSerializer: hotqueue::Serializer<T>,
{
    init_tracing();
    let queue = HotQueue::<T>::builder(name)
        .serializer(JsonSerializer)
        .store_config(redis_config())
        .connect()
        .await
        .expect("Redis must be reachable at HOTQUEUE_TEST_REDIS_URL");
    queue.clear().await.expect("failed to clear test queue");
    queue
}

/// Test payload carried through the JSON serializer
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: u32,
    pub kind: String,
}

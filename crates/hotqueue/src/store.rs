//! The list store seam: atomic list primitives the queue client is built on.

use crate::error::QueueError;
use crate::key::QueueKey;
use crate::provider::{StoreConfig, StoreType};
use crate::providers::{InMemoryStore, RedisStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Interface implemented by list stores (Redis, in-memory).
///
/// Every method maps to a single atomic store operation. Values are appended
/// at the tail and removed from the head only.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Append one or more values to the tail of the list in a single call
    async fn push_tail(&self, key: &QueueKey, values: &[Bytes]) -> Result<(), QueueError>;

    /// Remove and return the head of the list, `None` when empty or absent
    async fn pop_head(&self, key: &QueueKey) -> Result<Option<Bytes>, QueueError>;

    /// Wait for the head of the list.
    ///
    /// `None` as timeout waits indefinitely; the result is `None` only when
    /// the timeout expired with the list still empty.
    async fn blocking_pop_head(
        &self,
        key: &QueueKey,
        timeout: Option<Duration>,
    ) -> Result<Option<Bytes>, QueueError>;

    /// Number of entries in the list, 0 when the key is absent
    async fn length(&self, key: &QueueKey) -> Result<usize, QueueError>;

    /// Delete the list, a no-op when the key is absent
    async fn delete(&self, key: &QueueKey) -> Result<(), QueueError>;

    /// Get store type
    fn store_type(&self) -> StoreType;
}

/// Open the store described by a configuration.
///
/// Redis stores connect eagerly unless `lazy_connect` is set.
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn ListStore>, QueueError> {
    let store: Arc<dyn ListStore> = match config {
        StoreConfig::Redis(redis_config) if redis_config.lazy_connect => {
            Arc::new(RedisStore::new(redis_config)?)
        }
        StoreConfig::Redis(redis_config) => Arc::new(RedisStore::connect(redis_config).await?),
        StoreConfig::InMemory(memory_config) => {
            Arc::new(InMemoryStore::new(memory_config.clone()))
        }
    };

    Ok(store)
}

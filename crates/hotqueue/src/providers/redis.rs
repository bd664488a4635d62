//! Redis list store.
//!
//! Queue operations map one-to-one onto Redis list commands:
//!
//! | Operation             | Command |
//! |-----------------------|---------|
//! | `push_tail`           | `RPUSH` |
//! | `pop_head`            | `LPOP`  |
//! | `blocking_pop_head`   | `BLPOP` |
//! | `length`              | `LLEN`  |
//! | `delete`              | `DEL`   |
//!
//! Ordinary commands share one auto-reconnecting [`ConnectionManager`].
//! `BLPOP` parks the connection it is sent on, so every in-flight blocking
//! pop checks out a connection of its own. Finished pops hand their
//! connection back to a small idle set for reuse.

use crate::error::{ConfigurationError, QueueError};
use crate::key::QueueKey;
use crate::provider::{RedisConfig, StoreType};
use crate::store::ListStore;
use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::Client;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;

/// Smallest timeout sent to `BLPOP`; Redis reads zero as "wait forever".
const MIN_BLOCKING_TIMEOUT: Duration = Duration::from_millis(1);

/// Idle blocking connections kept for reuse
const MAX_IDLE_BLOCKING_CONNECTIONS: usize = 8;

/// Connections handed out to one borrower at a time.
///
/// A taken connection belongs to its borrower until given back; one that is
/// never given back is simply dropped.
struct IdleConnections<C> {
    idle: Mutex<Vec<C>>,
    max_idle: usize,
}

impl<C> IdleConnections<C> {
    fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    fn take(&self) -> Option<C> {
        self.idle.lock().ok()?.pop()
    }

    fn give_back(&self, connection: C) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.max_idle {
                idle.push(connection);
            }
        }
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.idle.lock().map_or(0, |idle| idle.len())
    }
}

/// Redis-backed list store
pub struct RedisStore {
    client: Client,
    target: String,
    connect_timeout: Duration,
    commands: OnceCell<ConnectionManager>,
    blocking: IdleConnections<MultiplexedConnection>,
}

impl RedisStore {
    /// Create a store that connects on first use.
    ///
    /// Only the configuration is checked here; connection failures surface
    /// from the first operation as [`QueueError::StoreUnavailable`].
    pub fn new(config: &RedisConfig) -> Result<Self, QueueError> {
        let url = config.connection_url()?;
        let client = Client::open(url.as_str()).map_err(|e| ConfigurationError::Invalid {
            message: format!("invalid redis connection info: {}", e),
        })?;

        Ok(Self {
            client,
            target: config.redacted_target(),
            connect_timeout: Duration::from_secs(config.connection_timeout_secs.max(1)),
            commands: OnceCell::new(),
            blocking: IdleConnections::new(MAX_IDLE_BLOCKING_CONNECTIONS),
        })
    }

    /// Create a store and open its command connection immediately.
    ///
    /// A server that cannot be reached is reported as a configuration error.
    pub async fn connect(config: &RedisConfig) -> Result<Self, QueueError> {
        let store = Self::new(config)?;

        store.commands().await.map_err(|e| ConfigurationError::Invalid {
            message: format!("could not connect to {}: {}", store.target, e),
        })?;

        info!(target_url = %store.target, "Connected to Redis");
        Ok(store)
    }

    async fn with_connect_timeout<T, F>(&self, connecting: F) -> Result<T, QueueError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.connect_timeout, connecting).await {
            Ok(result) => result.map_err(|e| QueueError::store_unavailable("connect", e)),
            Err(_) => Err(QueueError::store_unavailable(
                "connect",
                format!(
                    "timed out after {:?} connecting to {}",
                    self.connect_timeout, self.target
                ),
            )),
        }
    }

    async fn commands(&self) -> Result<ConnectionManager, QueueError> {
        let manager = self
            .commands
            .get_or_try_init(|| {
                self.with_connect_timeout(ConnectionManager::new(self.client.clone()))
            })
            .await?;

        Ok(manager.clone())
    }

    /// Check out a connection no other blocking pop is using
    async fn blocking_connection(&self) -> Result<MultiplexedConnection, QueueError> {
        if let Some(connection) = self.blocking.take() {
            return Ok(connection);
        }

        self.with_connect_timeout(self.client.get_multiplexed_async_connection())
            .await
    }
}

/// Seconds argument for `BLPOP`; zero blocks indefinitely.
fn blocking_timeout_secs(timeout: Option<Duration>) -> f64 {
    match timeout {
        None => 0.0,
        Some(timeout) => timeout.max(MIN_BLOCKING_TIMEOUT).as_secs_f64(),
    }
}

#[async_trait]
impl ListStore for RedisStore {
    async fn push_tail(&self, key: &QueueKey, values: &[Bytes]) -> Result<(), QueueError> {
        if values.is_empty() {
            return Ok(());
        }

        let mut connection = self.commands().await?;
        let mut command = redis::cmd("RPUSH");
        command.arg(key.as_str());
        for value in values {
            command.arg(value.as_ref());
        }

        let length: usize = command
            .query_async(&mut connection)
            .await
            .map_err(|e| QueueError::store_unavailable("RPUSH", e))?;

        debug!(queue = %key, pushed = values.len(), length, "RPUSH");
        Ok(())
    }

    async fn pop_head(&self, key: &QueueKey) -> Result<Option<Bytes>, QueueError> {
        let mut connection = self.commands().await?;
        let value: Option<Vec<u8>> = redis::cmd("LPOP")
            .arg(key.as_str())
            .query_async(&mut connection)
            .await
            .map_err(|e| QueueError::store_unavailable("LPOP", e))?;

        Ok(value.map(Bytes::from))
    }

    async fn blocking_pop_head(
        &self,
        key: &QueueKey,
        timeout: Option<Duration>,
    ) -> Result<Option<Bytes>, QueueError> {
        // Dropping this future mid-wait drops the only handle to the
        // connection, which closes the socket and makes Redis abandon the
        // parked BLPOP instead of popping a message nobody reads.
        let mut connection = self.blocking_connection().await?;
        let reply: Result<Option<(String, Vec<u8>)>, redis::RedisError> = redis::cmd("BLPOP")
            .arg(key.as_str())
            .arg(blocking_timeout_secs(timeout))
            .query_async(&mut connection)
            .await;

        match reply {
            Ok(popped) => {
                self.blocking.give_back(connection);
                Ok(popped.map(|(_, value)| Bytes::from(value)))
            }
            Err(e) => {
                warn!(queue = %key, error = %e, "BLPOP failed, dropping its connection");
                Err(QueueError::store_unavailable("BLPOP", e))
            }
        }
    }

    async fn length(&self, key: &QueueKey) -> Result<usize, QueueError> {
        let mut connection = self.commands().await?;
        redis::cmd("LLEN")
            .arg(key.as_str())
            .query_async(&mut connection)
            .await
            .map_err(|e| QueueError::store_unavailable("LLEN", e))
    }

    async fn delete(&self, key: &QueueKey) -> Result<(), QueueError> {
        let mut connection = self.commands().await?;
        let removed: usize = redis::cmd("DEL")
            .arg(key.as_str())
            .query_async(&mut connection)
            .await
            .map_err(|e| QueueError::store_unavailable("DEL", e))?;

        debug!(queue = %key, removed, "DEL");
        Ok(())
    }

    fn store_type(&self) -> StoreType {
        StoreType::Redis
    }
}

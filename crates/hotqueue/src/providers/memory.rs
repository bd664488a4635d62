//! In-memory list store for testing and development.
//!
//! Lists live in a `HashMap` behind a mutex. Blocking pops park on a
//! [`Notify`] that every push signals, so waiting consumers never poll.
//! Lists that become empty are removed, mirroring how Redis drops empty keys.

use crate::error::QueueError;
use crate::key::QueueKey;
use crate::provider::{InMemoryConfig, StoreType};
use crate::store::ListStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Storage for all lists
struct ListStorage {
    lists: HashMap<QueueKey, VecDeque<Bytes>>,
    config: InMemoryConfig,
}

impl ListStorage {
    fn new(config: InMemoryConfig) -> Self {
        Self {
            lists: HashMap::new(),
            config,
        }
    }

    fn pop_front(&mut self, key: &QueueKey) -> Option<Bytes> {
        let list = self.lists.get_mut(key)?;
        let value = list.pop_front();
        if list.is_empty() {
            self.lists.remove(key);
        }
        value
    }
}

/// In-memory list store
#[derive(Clone)]
pub struct InMemoryStore {
    storage: Arc<Mutex<ListStorage>>,
    pushed: Arc<Notify>,
}

impl InMemoryStore {
    /// Create new in-memory store with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            storage: Arc::new(Mutex::new(ListStorage::new(config))),
            pushed: Arc::new(Notify::new()),
        }
    }

    fn lock(&self, operation: &str) -> Result<MutexGuard<'_, ListStorage>, QueueError> {
        self.storage
            .lock()
            .map_err(|_| QueueError::store_unavailable(operation, "in-memory storage poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl ListStore for InMemoryStore {
    async fn push_tail(&self, key: &QueueKey, values: &[Bytes]) -> Result<(), QueueError> {
        if values.is_empty() {
            return Ok(());
        }

        {
            let mut storage = self.lock("push_tail")?;
            let max_queue_size = storage.config.max_queue_size;
            let list = storage.lists.entry(key.clone()).or_default();

            if let Some(max) = max_queue_size {
                if list.len() + values.len() > max {
                    let current = list.len();
                    if current == 0 {
                        storage.lists.remove(key);
                    }
                    return Err(QueueError::store_unavailable(
                        "push_tail",
                        format!(
                            "list {} holds {} of {} entries, cannot add {}",
                            key,
                            current,
                            max,
                            values.len()
                        ),
                    ));
                }
            }

            list.extend(values.iter().cloned());
        }

        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop_head(&self, key: &QueueKey) -> Result<Option<Bytes>, QueueError> {
        Ok(self.lock("pop_head")?.pop_front(key))
    }

    async fn blocking_pop_head(
        &self,
        key: &QueueKey,
        timeout: Option<Duration>,
    ) -> Result<Option<Bytes>, QueueError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        loop {
            // Register interest before checking so a push between the check
            // and the wait still wakes us.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let popped = self.lock("blocking_pop_head")?.pop_front(key);
            if popped.is_some() {
                return Ok(popped);
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(None);
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn length(&self, key: &QueueKey) -> Result<usize, QueueError> {
        Ok(self
            .lock("length")?
            .lists
            .get(key)
            .map_or(0, VecDeque::len))
    }

    async fn delete(&self, key: &QueueKey) -> Result<(), QueueError> {
        self.lock("delete")?.lists.remove(key);
        Ok(())
    }

    fn store_type(&self) -> StoreType {
        StoreType::InMemory
    }
}

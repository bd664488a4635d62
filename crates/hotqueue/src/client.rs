//! The queue client: a FIFO queue stored in a single list.

use crate::bulk::{flush_items, BulkScope, BulkState};
use crate::consumer::{Consumer, GetOptions};
use crate::error::{ConfigurationError, QueueError};
use crate::key::{QueueKey, QueueName};
use crate::provider::{QueueSettings, StoreConfig, StoreType};
use crate::serializer::{BincodeSerializer, Serializer};
use crate::store::{connect_store, ListStore};
use crate::worker::{MessageHandler, Worker, WorkerConfig};
use chrono::Duration;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Number of buffered messages that triggers a flush in bulk mode
pub const DEFAULT_BULK_SIZE: usize = 500;

/// Simple FIFO message queue stored in a list.
///
/// Messages are appended to the tail with [`put`](Self::put) and taken from
/// the head with [`get`](Self::get), [`consume`](Self::consume) or a
/// [`worker`](Self::worker). Ordering, atomicity and blocking are provided by
/// the store.
///
/// ```no_run
/// use hotqueue::{GetOptions, HotQueue, RedisConfig, StoreConfig};
///
/// # async fn example() -> Result<(), hotqueue::QueueError> {
/// let queue: HotQueue<String> =
///     HotQueue::connect("myqueue", &StoreConfig::Redis(RedisConfig::default())).await?;
///
/// queue.put(&"my message".to_string()).await?;
/// let message = queue.get(GetOptions::default()).await?;
/// assert_eq!(message.as_deref(), Some("my message"));
/// # Ok(())
/// # }
/// ```
pub struct HotQueue<T, S = BincodeSerializer> {
    name: QueueName,
    key: QueueKey,
    serializer: S,
    store: Arc<dyn ListStore>,
    bulk: Arc<Mutex<BulkState>>,
    default_bulk_size: usize,
    _message: PhantomData<fn() -> T>,
}

impl<T> HotQueue<T, BincodeSerializer> {
    /// Start building a queue client
    pub fn builder(name: impl Into<String>) -> HotQueueBuilder<T, BincodeSerializer> {
        HotQueueBuilder {
            name: name.into(),
            serializer: BincodeSerializer,
            store: None,
            store_config: StoreConfig::default(),
            default_bulk_size: DEFAULT_BULK_SIZE,
            _message: PhantomData,
        }
    }

    /// Connect a queue client with the default serializer
    pub async fn connect(name: impl Into<String>, config: &StoreConfig) -> Result<Self, QueueError>
    where
        BincodeSerializer: Serializer<T>,
    {
        Self::builder(name).store_config(config.clone()).connect().await
    }

    /// Connect a queue client described by loaded settings
    pub async fn from_settings(settings: &QueueSettings) -> Result<Self, QueueError>
    where
        BincodeSerializer: Serializer<T>,
    {
        settings.validate()?;
        Self::builder(settings.name.clone())
            .store_config(settings.store.clone())
            .default_bulk_size(settings.bulk_size)
            .connect()
            .await
    }
}

impl<T, S> HotQueue<T, S>
where
    S: Serializer<T>,
{
    /// Create a queue client around an existing store handle
    pub fn with_store(
        name: impl Into<String>,
        serializer: S,
        store: Arc<dyn ListStore>,
    ) -> Result<Self, QueueError> {
        let name = QueueName::new(name).map_err(|e| ConfigurationError::Invalid {
            message: e.to_string(),
        })?;

        Ok(Self {
            key: name.key(),
            name,
            serializer,
            store,
            bulk: Arc::new(Mutex::new(BulkState::default())),
            default_bulk_size: DEFAULT_BULK_SIZE,
            _message: PhantomData,
        })
    }

    /// Get the logical queue name
    pub fn name(&self) -> &QueueName {
        &self.name
    }

    /// Get the store key holding this queue
    pub fn key(&self) -> &QueueKey {
        &self.key
    }

    /// Get the configured serializer
    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    /// Get the type of the backing store
    pub fn store_type(&self) -> StoreType {
        self.store.store_type()
    }

    /// Bulk size used when [`begin_bulk`](Self::begin_bulk) is given `None`
    pub fn default_bulk_size(&self) -> usize {
        self.default_bulk_size
    }

    /// Number of messages waiting in the queue
    pub async fn len(&self) -> Result<usize, QueueError> {
        self.store.length(&self.key).await
    }

    /// Check whether the queue holds no messages
    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }

    /// Clear the queue of all messages by deleting its key.
    ///
    /// Messages buffered by an active bulk scope are not part of the queue
    /// yet and are left alone.
    pub async fn clear(&self) -> Result<(), QueueError> {
        self.store.delete(&self.key).await?;
        debug!(queue = %self.key, "Cleared queue");
        Ok(())
    }

    /// Put a message onto the queue
    pub async fn put(&self, message: &T) -> Result<(), QueueError> {
        self.put_all(std::slice::from_ref(message)).await
    }

    /// Put several messages onto the queue, in iteration order.
    ///
    /// All messages are serialized before anything is written, so a message
    /// that fails to serialize leaves the queue untouched. Outside bulk mode
    /// each message is a separate append.
    ///
    /// In bulk mode the call's messages join the buffer together. If that
    /// takes the buffer to the bulk size, the whole buffer is flushed as one
    /// append; should that append fail, the call's messages are taken back
    /// out of the buffer and the error is returned, so a failed call
    /// contributes nothing to the queue.
    pub async fn put_all<'m, I>(&self, messages: I) -> Result<(), QueueError>
    where
        I: IntoIterator<Item = &'m T>,
        T: 'm,
    {
        let encoded = messages
            .into_iter()
            .map(|message| self.serializer.encode(message))
            .collect::<Result<Vec<_>, _>>()?;

        if encoded.is_empty() {
            return Ok(());
        }

        let mut bulk = self.bulk.lock().await;
        if bulk.active {
            let accepted = bulk.items.len();
            bulk.items.extend(encoded);
            if bulk.items.len() >= bulk.size {
                if let Err(e) = flush_items(self.store.as_ref(), &self.key, &mut bulk.items).await {
                    bulk.items.truncate(accepted);
                    return Err(e);
                }
            }
            return Ok(());
        }
        drop(bulk);

        let count = encoded.len();
        for item in encoded {
            self.store
                .push_tail(&self.key, std::slice::from_ref(&item))
                .await?;
        }
        debug!(queue = %self.key, count, "Put messages");
        Ok(())
    }

    /// Enter bulk mode, returning the scope that owns it.
    ///
    /// `None` uses the queue's default bulk size. While the scope is active,
    /// [`put`](Self::put) buffers messages locally and flushes them as one
    /// append whenever `bulk_size` are waiting. Call
    /// [`BulkScope::release`] to leave bulk mode and flush the remainder.
    ///
    /// Fails with [`QueueError::InvalidState`] if bulk mode is already active.
    pub async fn begin_bulk(
        &self,
        bulk_size: Option<usize>,
    ) -> Result<BulkScope<'_, T, S>, QueueError> {
        let bulk_size = bulk_size.unwrap_or(self.default_bulk_size);
        if bulk_size == 0 {
            return Err(ConfigurationError::Invalid {
                message: "bulk_size must be at least 1".to_string(),
            }
            .into());
        }

        self.bulk.lock().await.activate(bulk_size)?;
        debug!(queue = %self.key, bulk_size, "Entered bulk mode");
        Ok(BulkScope::new(self, bulk_size))
    }

    /// Run `body` in bulk mode.
    ///
    /// Buffered messages are flushed when `body` finishes, whether it
    /// succeeded or not. The body's error takes precedence over a flush
    /// error.
    ///
    /// ```no_run
    /// # async fn example(queue: hotqueue::HotQueue<String>) -> Result<(), hotqueue::QueueError> {
    /// queue
    ///     .bulk(Some(1000), async {
    ///         for counter in 0..10_000 {
    ///             queue.put(&format!("message {}", counter)).await?;
    ///         }
    ///         Ok(())
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn bulk<F, R>(&self, bulk_size: Option<usize>, body: F) -> Result<R, QueueError>
    where
        F: Future<Output = Result<R, QueueError>>,
    {
        let scope = self.begin_bulk(bulk_size).await?;
        let outcome = body.await;
        let flushed = scope.release().await;

        match (outcome, flushed) {
            (Err(body_error), _) => Err(body_error),
            (Ok(_), Err(flush_error)) => Err(flush_error),
            (Ok(value), Ok(_)) => Ok(value),
        }
    }

    /// Take a message from the head of the queue.
    ///
    /// Returns `Ok(None)` when the queue is empty (non-blocking) or when the
    /// timeout expired (blocking). A message that fails to decode has
    /// already been removed from the queue.
    pub async fn get(&self, options: GetOptions) -> Result<Option<T>, QueueError> {
        let payload = if options.block {
            let timeout = options.wait_limit()?;
            self.store.blocking_pop_head(&self.key, timeout).await?
        } else {
            self.store.pop_head(&self.key).await?
        };

        match payload {
            Some(payload) => Ok(Some(self.serializer.decode(&payload)?)),
            None => Ok(None),
        }
    }

    /// Take a message without waiting
    pub async fn get_nowait(&self) -> Result<Option<T>, QueueError> {
        self.get(GetOptions::default()).await
    }

    /// Wait for a message, up to `timeout` (`None` waits indefinitely)
    pub async fn get_blocking(&self, timeout: Option<Duration>) -> Result<Option<T>, QueueError> {
        self.get(GetOptions::blocking(timeout)).await
    }

    /// Lazily consume messages until the queue runs dry.
    ///
    /// ```no_run
    /// # async fn example(queue: hotqueue::HotQueue<String>) -> Result<(), hotqueue::QueueError> {
    /// use hotqueue::GetOptions;
    ///
    /// let mut consumer = queue.consume(GetOptions::consume_default().timeout(chrono::Duration::seconds(1)));
    /// while let Some(message) = consumer.next().await? {
    ///     println!("{}", message);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn consume(&self, options: GetOptions) -> Consumer<'_, T, S> {
        Consumer::new(self, options)
    }

    /// Wrap `handler` as a worker that blocks for new messages
    pub fn worker<H>(&self, handler: H) -> Worker<'_, T, S, H>
    where
        T: Send + 'static,
        H: MessageHandler<T>,
    {
        WorkerConfig::default().wrap(self, handler)
    }

    /// Wrap `handler` as a worker with explicit get options
    pub fn worker_with<H>(&self, config: WorkerConfig, handler: H) -> Worker<'_, T, S, H>
    where
        T: Send + 'static,
        H: MessageHandler<T>,
    {
        config.wrap(self, handler)
    }

    pub(crate) fn bulk_state(&self) -> &Arc<Mutex<BulkState>> {
        &self.bulk
    }

    pub(crate) fn store_handle(&self) -> &Arc<dyn ListStore> {
        &self.store
    }
}

/// Builder for [`HotQueue`]
pub struct HotQueueBuilder<T, S = BincodeSerializer> {
    name: String,
    serializer: S,
    store: Option<Arc<dyn ListStore>>,
    store_config: StoreConfig,
    default_bulk_size: usize,
    _message: PhantomData<fn() -> T>,
}

impl<T, S> HotQueueBuilder<T, S> {
    /// Use a different serializer
    pub fn serializer<S2>(self, serializer: S2) -> HotQueueBuilder<T, S2> {
        HotQueueBuilder {
            name: self.name,
            serializer,
            store: self.store,
            store_config: self.store_config,
            default_bulk_size: self.default_bulk_size,
            _message: PhantomData,
        }
    }

    /// Connect to the store described by `config`
    pub fn store_config(mut self, config: StoreConfig) -> Self {
        self.store_config = config;
        self
    }

    /// Use an already open store; takes precedence over `store_config`
    pub fn store(mut self, store: Arc<dyn ListStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bulk size used when a bulk scope does not name one
    pub fn default_bulk_size(mut self, bulk_size: usize) -> Self {
        self.default_bulk_size = bulk_size;
        self
    }

    /// Open the store (if needed) and build the client
    pub async fn connect(self) -> Result<HotQueue<T, S>, QueueError>
    where
        S: Serializer<T>,
    {
        if self.default_bulk_size == 0 {
            return Err(ConfigurationError::Invalid {
                message: "bulk_size must be at least 1".to_string(),
            }
            .into());
        }
        // Reject a bad name before opening any connection.
        QueueName::new(self.name.as_str()).map_err(|e| ConfigurationError::Invalid {
            message: e.to_string(),
        })?;

        let store = match self.store {
            Some(store) => store,
            None => connect_store(&self.store_config).await?,
        };

        let mut queue = HotQueue::with_store(self.name, self.serializer, store)?;
        queue.default_bulk_size = self.default_bulk_size;

        info!(
            queue = %queue.key,
            store = ?queue.store_type(),
            "Queue client ready"
        );
        Ok(queue)
    }
}

//! Bulk mode: client-side batching of puts.
//!
//! A [`BulkScope`] owns bulk mode for its queue from
//! [`HotQueue::begin_bulk`] until [`BulkScope::release`]. Buffered messages
//! are already serialized and go to the store as a single multi-value append.

use crate::client::HotQueue;
use crate::error::QueueError;
use crate::key::QueueKey;
use crate::serializer::Serializer;
use crate::store::ListStore;
use bytes::Bytes;
use tracing::{debug, error, warn};

#[cfg(test)]
#[path = "bulk_tests.rs"]
mod tests;

/// Bulk mode state of one queue client
#[derive(Debug, Default)]
pub(crate) struct BulkState {
    pub(crate) active: bool,
    pub(crate) size: usize,
    pub(crate) items: Vec<Bytes>,
}

impl BulkState {
    pub(crate) fn activate(&mut self, size: usize) -> Result<(), QueueError> {
        if self.active {
            return Err(QueueError::InvalidState {
                message: format!(
                    "bulk mode is already active with {} buffered messages",
                    self.items.len()
                ),
            });
        }

        self.active = true;
        self.size = size;
        self.items.clear();
        Ok(())
    }

    /// Leave bulk mode, handing back whatever is still buffered
    pub(crate) fn deactivate(&mut self) -> Vec<Bytes> {
        self.active = false;
        std::mem::take(&mut self.items)
    }
}

/// Push buffered messages as one append; the buffer is cleared only on success
pub(crate) async fn flush_items(
    store: &dyn ListStore,
    key: &QueueKey,
    items: &mut Vec<Bytes>,
) -> Result<usize, QueueError> {
    if items.is_empty() {
        return Ok(0);
    }

    store.push_tail(key, items).await?;
    let flushed = items.len();
    items.clear();

    debug!(queue = %key, flushed, "Flushed bulk buffer");
    Ok(flushed)
}

/// Active bulk mode on a queue.
///
/// Release it with [`release`](Self::release). A scope dropped without being
/// released (early return, panic, cancelled future) still leaves bulk mode,
/// and its buffer is flushed from a background task on the current tokio
/// runtime.
pub struct BulkScope<'q, T, S>
where
    S: Serializer<T>,
{
    queue: &'q HotQueue<T, S>,
    bulk_size: usize,
    released: bool,
}

impl<'q, T, S> BulkScope<'q, T, S>
where
    S: Serializer<T>,
{
    pub(crate) fn new(queue: &'q HotQueue<T, S>, bulk_size: usize) -> Self {
        Self {
            queue,
            bulk_size,
            released: false,
        }
    }

    /// Number of buffered messages that triggers a flush
    pub fn bulk_size(&self) -> usize {
        self.bulk_size
    }

    /// Get the queue this scope batches for
    pub fn queue(&self) -> &'q HotQueue<T, S> {
        self.queue
    }

    /// Put a message through the queue (buffered while the scope is active)
    pub async fn put(&self, message: &T) -> Result<(), QueueError> {
        self.queue.put(message).await
    }

    /// Number of messages currently buffered
    pub async fn buffered(&self) -> usize {
        self.queue.bulk_state().lock().await.items.len()
    }

    /// Flush the buffer now without leaving bulk mode
    pub async fn flush(&self) -> Result<usize, QueueError> {
        let mut bulk = self.queue.bulk_state().lock().await;
        flush_items(
            self.queue.store_handle().as_ref(),
            self.queue.key(),
            &mut bulk.items,
        )
        .await
    }

    /// Leave bulk mode and flush the remaining buffer.
    ///
    /// Returns the number of messages written by the final flush. If that
    /// flush fails the buffered messages are lost and logged as dropped.
    pub async fn release(mut self) -> Result<usize, QueueError> {
        self.released = true;

        let mut bulk = self.queue.bulk_state().lock().await;
        let mut items = bulk.deactivate();
        let pending = items.len();

        let result = flush_items(
            self.queue.store_handle().as_ref(),
            self.queue.key(),
            &mut items,
        )
        .await;
        drop(bulk);

        match result {
            Ok(flushed) => {
                debug!(queue = %self.queue.key(), flushed, "Left bulk mode");
                Ok(flushed)
            }
            Err(e) => {
                error!(
                    queue = %self.queue.key(),
                    dropped = pending,
                    error = %e,
                    "Final bulk flush failed, buffered messages were not written"
                );
                Err(e)
            }
        }
    }
}

impl<T, S> Drop for BulkScope<'_, T, S>
where
    S: Serializer<T>,
{
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let state = self.queue.bulk_state().clone();
        let store = self.queue.store_handle().clone();
        let key = self.queue.key().clone();

        // Take the lock now if it is free so nothing is buffered behind the
        // dropped scope; it is held until the buffer is written.
        let guard = state.clone().try_lock_owned().ok();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!(queue = %key, "Bulk scope dropped without release, flushing in background");
                runtime.spawn(async move {
                    let mut bulk = match guard {
                        Some(guard) => guard,
                        None => state.lock_owned().await,
                    };
                    let mut items = bulk.deactivate();
                    let pending = items.len();
                    if let Err(e) = flush_items(store.as_ref(), &key, &mut items).await {
                        error!(
                            queue = %key,
                            dropped = pending,
                            error = %e,
                            "Background bulk flush failed, buffered messages were not written"
                        );
                    }
                });
            }
            Err(_) => {
                let dropped = guard.map_or(0, |mut bulk| bulk.deactivate().len());
                error!(
                    queue = %key,
                    dropped,
                    "Bulk scope dropped outside a tokio runtime, buffered messages were not written"
                );
            }
        }
    }
}

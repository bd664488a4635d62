//! Get options and the lazy consume sequence.

use crate::client::HotQueue;
use crate::error::{QueueError, ValidationError};
use crate::serializer::Serializer;
use chrono::Duration;
use futures::stream::{self, Stream};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

/// Options controlling how a message is taken from the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Wait for a message instead of returning immediately
    pub block: bool,
    /// Give up waiting after this long; `None` or zero waits indefinitely
    pub timeout: Option<Duration>,
}

impl GetOptions {
    /// Non-blocking get, the default for [`HotQueue::get`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocking get with an optional timeout
    pub fn blocking(timeout: Option<Duration>) -> Self {
        Self {
            block: true,
            timeout,
        }
    }

    /// Blocking without timeout, the default for consumers and workers
    pub fn consume_default() -> Self {
        Self::blocking(None)
    }

    /// Set whether to wait for messages
    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    /// Set the blocking timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// How long a blocking get may wait; `None` means indefinitely
    pub(crate) fn wait_limit(&self) -> Result<Option<std::time::Duration>, ValidationError> {
        match self.timeout {
            None => Ok(None),
            Some(timeout) if timeout.is_zero() => Ok(None),
            Some(timeout) => timeout
                .to_std()
                .map(Some)
                .map_err(|_| ValidationError::OutOfRange {
                    field: "timeout".to_string(),
                    message: format!("must not be negative, got {}", timeout),
                }),
        }
    }
}

type Cancellation<'q> = Pin<Box<dyn Future<Output = ()> + Send + 'q>>;

/// Lazy sequence of messages taken from a queue.
///
/// Each call to [`next`](Self::next) performs one get. The sequence ends
/// (`Ok(None)`) the first time a get comes back empty: immediately for a
/// non-blocking consumer on an empty queue, after a full timeout with no
/// arrivals for a blocking one. Once ended it stays ended.
///
/// A store failure is returned as an error and ends the sequence. A message
/// that fails to decode is returned as an error too, but has already left
/// the queue, so the sequence carries on with the next one.
pub struct Consumer<'q, T, S> {
    queue: &'q HotQueue<T, S>,
    options: GetOptions,
    cancellation: Option<Cancellation<'q>>,
    finished: bool,
}

impl<'q, T, S> Consumer<'q, T, S>
where
    S: Serializer<T>,
{
    pub(crate) fn new(queue: &'q HotQueue<T, S>, options: GetOptions) -> Self {
        Self {
            queue,
            options,
            cancellation: None,
            finished: false,
        }
    }

    /// End the sequence quietly once `signal` completes.
    ///
    /// The signal is also watched while a blocking get is waiting. An
    /// interrupted get is abandoned: the message stays queued unless the pop
    /// had already completed in the store.
    pub fn until<F>(mut self, signal: F) -> Self
    where
        F: Future<Output = ()> + Send + 'q,
    {
        self.cancellation = Some(Box::pin(signal));
        self
    }

    /// Get the options each get is made with
    pub fn options(&self) -> GetOptions {
        self.options
    }

    /// Check whether the sequence has ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Take the next message, `Ok(None)` once the sequence has ended
    pub async fn next(&mut self) -> Result<Option<T>, QueueError> {
        if self.finished {
            return Ok(None);
        }

        let received = match self.cancellation.as_mut() {
            Some(cancellation) => {
                tokio::select! {
                    biased;
                    _ = cancellation.as_mut() => {
                        debug!(queue = %self.queue.key(), "Consumer cancelled");
                        self.cancellation = None;
                        self.finished = true;
                        return Ok(None);
                    }
                    received = self.queue.get(self.options) => received,
                }
            }
            None => self.queue.get(self.options).await,
        };

        let received = match received {
            Ok(received) => received,
            Err(e) => {
                if !matches!(e, QueueError::Serialization(_)) {
                    debug!(queue = %self.queue.key(), error = %e, "Consumer stopped by error");
                    self.finished = true;
                }
                return Err(e);
            }
        };

        if received.is_none() {
            debug!(queue = %self.queue.key(), "Queue ran dry, consumer finished");
            self.finished = true;
        }
        Ok(received)
    }

    /// Adapt the consumer into a [`Stream`].
    ///
    /// The stream ends when the sequence ends, or right after yielding an
    /// error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, QueueError>> + 'q
    where
        T: 'q,
    {
        stream::try_unfold(self, |mut consumer| async move {
            let next = consumer.next().await?;
            Ok::<_, QueueError>(next.map(|message| (message, consumer)))
        })
    }
}

//! Queue workers: handlers driven by a consume loop.
//!
//! There are two ways to build a worker:
//!
//! - [`HotQueue::worker`] wraps a handler with the consumer defaults
//!   (blocking, no timeout)
//! - [`WorkerConfig::wrap`] / [`HotQueue::worker_with`] wrap a handler with
//!   explicit get options
//!
//! ```no_run
//! # async fn example(queue: hotqueue::HotQueue<String>) -> Result<(), hotqueue::QueueError> {
//! use hotqueue::WorkerConfig;
//!
//! let mut printer = WorkerConfig::new()
//!     .timeout(chrono::Duration::seconds(1))
//!     .wrap(&queue, |message: String| println!("{}", message));
//! let handled = printer.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::client::HotQueue;
use crate::consumer::GetOptions;
use crate::error::QueueError;
use crate::serializer::Serializer;
use async_trait::async_trait;
use chrono::Duration;
use std::future::Future;
use tracing::info;

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

/// Processes messages handed over by a [`Worker`]
#[async_trait]
pub trait MessageHandler<T: Send + 'static>: Send {
    /// Handle one message
    async fn handle(&mut self, message: T);
}

#[async_trait]
impl<T, F> MessageHandler<T> for F
where
    T: Send + 'static,
    F: FnMut(T) + Send,
{
    async fn handle(&mut self, message: T) {
        self(message)
    }
}

/// Get options for a worker; blocking without timeout by default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    options: GetOptions,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            options: GetOptions::consume_default(),
        }
    }
}

impl WorkerConfig {
    /// Create worker configuration with the consumer defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Use explicit get options
    pub fn with_options(options: GetOptions) -> Self {
        Self { options }
    }

    /// Set whether to wait for messages
    pub fn block(mut self, block: bool) -> Self {
        self.options.block = block;
        self
    }

    /// Stop after this long without a new message
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Get the options the worker consumes with
    pub fn options(&self) -> GetOptions {
        self.options
    }

    /// Bind a handler to a queue
    pub fn wrap<'q, T, S, H>(self, queue: &'q HotQueue<T, S>, handler: H) -> Worker<'q, T, S, H>
    where
        T: Send + 'static,
        S: Serializer<T>,
        H: MessageHandler<T>,
    {
        Worker {
            queue,
            options: self.options,
            handler,
        }
    }
}

/// A handler bound to a queue.
///
/// [`run`](Self::run) consumes until the queue runs dry, calling the handler
/// for each message in order on the calling task.
pub struct Worker<'q, T, S, H> {
    queue: &'q HotQueue<T, S>,
    options: GetOptions,
    handler: H,
}

impl<'q, T, S, H> Worker<'q, T, S, H>
where
    T: Send + 'static,
    S: Serializer<T>,
    H: MessageHandler<T>,
{
    /// Get the options the worker consumes with
    pub fn options(&self) -> GetOptions {
        self.options
    }

    /// Get the wrapped handler
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Unwrap the handler
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Consume and handle messages until the sequence ends.
    ///
    /// Returns the number of messages handled. Store and decode errors stop
    /// the worker and are returned.
    pub async fn run(&mut self) -> Result<usize, QueueError> {
        let consumer = self.queue.consume(self.options);
        self.drain(consumer).await
    }

    /// Like [`run`](Self::run), but stop quietly once `signal` completes
    pub async fn run_until<F>(&mut self, signal: F) -> Result<usize, QueueError>
    where
        F: Future<Output = ()> + Send + 'q,
    {
        let consumer = self.queue.consume(self.options).until(signal);
        self.drain(consumer).await
    }

    async fn drain(
        &mut self,
        mut consumer: crate::consumer::Consumer<'q, T, S>,
    ) -> Result<usize, QueueError> {
        let mut handled = 0;
        while let Some(message) = consumer.next().await? {
            self.handler.handle(message).await;
            handled += 1;
        }

        info!(queue = %self.queue.key(), handled, "Worker finished");
        Ok(handled)
    }
}

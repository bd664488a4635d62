//! Tests for get options and consumers.

use super::*;
use crate::key::QueueKey;
use crate::provider::StoreType;
use crate::providers::InMemoryStore;
use crate::serializer::BincodeSerializer;
use crate::store::ListStore;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory store whose pops can be switched to fail
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryStore,
    fail_pops: AtomicBool,
}

#[async_trait]
impl ListStore for FlakyStore {
    async fn push_tail(&self, key: &QueueKey, values: &[Bytes]) -> Result<(), QueueError> {
        self.inner.push_tail(key, values).await
    }

    async fn pop_head(&self, key: &QueueKey) -> Result<Option<Bytes>, QueueError> {
        if self.fail_pops.load(Ordering::SeqCst) {
            return Err(QueueError::store_unavailable("LPOP", "connection reset"));
        }
        self.inner.pop_head(key).await
    }

    async fn blocking_pop_head(
        &self,
        key: &QueueKey,
        timeout: Option<std::time::Duration>,
    ) -> Result<Option<Bytes>, QueueError> {
        if self.fail_pops.load(Ordering::SeqCst) {
            return Err(QueueError::store_unavailable("BLPOP", "connection reset"));
        }
        self.inner.blocking_pop_head(key, timeout).await
    }

    async fn length(&self, key: &QueueKey) -> Result<usize, QueueError> {
        self.inner.length(key).await
    }

    async fn delete(&self, key: &QueueKey) -> Result<(), QueueError> {
        self.inner.delete(key).await
    }

    fn store_type(&self) -> StoreType {
        StoreType::InMemory
    }
}

fn test_queue() -> HotQueue<u32> {
    HotQueue::with_store("testqueue", BincodeSerializer, Arc::new(InMemoryStore::default()))
        .unwrap()
}

// ============================================================================
// GetOptions
// ============================================================================

mod get_options {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(
            GetOptions::default(),
            GetOptions {
                block: false,
                timeout: None
            }
        );
        assert_eq!(
            GetOptions::consume_default(),
            GetOptions {
                block: true,
                timeout: None
            }
        );
    }

    #[test]
    fn test_builder_methods() {
        let options = GetOptions::new().block(true).timeout(Duration::seconds(3));

        assert!(options.block);
        assert_eq!(options.timeout, Some(Duration::seconds(3)));
    }

    #[test]
    fn test_wait_limit() {
        assert_eq!(GetOptions::blocking(None).wait_limit().unwrap(), None);
        assert_eq!(
            GetOptions::blocking(Some(Duration::zero()))
                .wait_limit()
                .unwrap(),
            None
        );
        assert_eq!(
            GetOptions::blocking(Some(Duration::milliseconds(1500)))
                .wait_limit()
                .unwrap(),
            Some(std::time::Duration::from_millis(1500))
        );
        assert!(matches!(
            GetOptions::blocking(Some(Duration::seconds(-5))).wait_limit(),
            Err(ValidationError::OutOfRange { .. })
        ));
    }
}

// ============================================================================
// Consumer
// ============================================================================

mod consumer {
    use super::*;

    #[tokio::test]
    async fn test_consume_drains_then_ends() {
        let queue = test_queue();
        queue.put_all(&[1, 2, 3]).await.unwrap();

        let mut consumer = queue.consume(GetOptions::new());
        let mut messages = Vec::new();
        while let Some(message) = consumer.next().await.unwrap() {
            messages.push(message);
        }

        assert_eq!(messages, vec![1, 2, 3]);
        assert!(consumer.is_finished());
    }

    #[tokio::test]
    async fn test_consume_empty_queue_ends_immediately() {
        let queue = test_queue();

        let mut consumer = queue.consume(GetOptions::new());

        assert_eq!(consumer.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_consumer_stays_finished() {
        let queue = test_queue();
        let mut consumer = queue.consume(GetOptions::new());
        assert_eq!(consumer.next().await.unwrap(), None);

        queue.put(&9).await.unwrap();

        assert_eq!(consumer.next().await.unwrap(), None);
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_consume_ends_after_timeout() {
        let queue = test_queue();
        queue.put(&1).await.unwrap();
        let started = tokio::time::Instant::now();

        let mut consumer = queue.consume(GetOptions::blocking(Some(Duration::seconds(1))));
        assert_eq!(consumer.next().await.unwrap(), Some(1));
        assert_eq!(consumer.next().await.unwrap(), None);

        assert!(started.elapsed() >= std::time::Duration::from_secs(1));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_consume_sees_late_messages() {
        let queue = Arc::new(test_queue());
        let producer = Arc::clone(&queue);

        tokio::spawn(async move {
            for message in 0..3 {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                producer.put(&message).await.unwrap();
            }
        });

        let mut consumer = queue.consume(GetOptions::blocking(Some(Duration::seconds(1))));
        let mut messages = Vec::new();
        while let Some(message) = consumer.next().await.unwrap() {
            messages.push(message);
        }

        assert_eq!(messages, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_store_error_ends_the_sequence() {
        let store = Arc::new(FlakyStore::default());
        let queue: HotQueue<u32> =
            HotQueue::with_store("testqueue", BincodeSerializer, store.clone()).unwrap();
        queue.put(&5).await.unwrap();

        let mut consumer = queue.consume(GetOptions::new());
        store.fail_pops.store(true, Ordering::SeqCst);
        assert!(matches!(
            consumer.next().await,
            Err(QueueError::StoreUnavailable { .. })
        ));
        assert!(consumer.is_finished());

        store.fail_pops.store(false, Ordering::SeqCst);
        assert_eq!(consumer.next().await.unwrap(), None);
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_timeout_ends_the_sequence() {
        let queue = test_queue();
        queue.put(&5).await.unwrap();

        let mut consumer = queue.consume(GetOptions::blocking(Some(Duration::seconds(-1))));

        assert!(matches!(
            consumer.next().await,
            Err(QueueError::Validation(_))
        ));
        assert_eq!(consumer.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_decode_error_does_not_end_the_sequence() {
        let store: Arc<dyn ListStore> = Arc::new(InMemoryStore::default());
        let queue: HotQueue<u32> =
            HotQueue::with_store("testqueue", BincodeSerializer, Arc::clone(&store)).unwrap();
        let raw: HotQueue<Vec<u8>, crate::serializer::NoSerializer> =
            HotQueue::with_store("testqueue", crate::serializer::NoSerializer, store).unwrap();

        raw.put(&vec![0xff]).await.unwrap();
        queue.put(&7).await.unwrap();

        let mut consumer = queue.consume(GetOptions::new());
        assert!(matches!(
            consumer.next().await,
            Err(QueueError::Serialization(_))
        ));
        assert!(!consumer.is_finished());
        assert_eq!(consumer.next().await.unwrap(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_cancels_a_waiting_consumer() {
        let queue = test_queue();
        queue.put(&1).await.unwrap();

        let mut consumer = queue
            .consume(GetOptions::consume_default())
            .until(tokio::time::sleep(std::time::Duration::from_secs(10)));

        assert_eq!(consumer.next().await.unwrap(), Some(1));
        assert_eq!(consumer.next().await.unwrap(), None);
        assert!(consumer.is_finished());
    }

    #[tokio::test]
    async fn test_until_with_completed_signal_takes_nothing() {
        let queue = test_queue();
        queue.put(&1).await.unwrap();

        let mut consumer = queue
            .consume(GetOptions::new())
            .until(std::future::ready(()));

        assert_eq!(consumer.next().await.unwrap(), None);
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let queue = test_queue();
        queue.put_all(&[10, 20, 30]).await.unwrap();

        let messages: Vec<u32> = queue
            .consume(GetOptions::new())
            .into_stream()
            .map(|message| message.unwrap())
            .collect()
            .await;

        assert_eq!(messages, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_stream_ends_after_error() {
        let store = Arc::new(FlakyStore::default());
        let queue: HotQueue<u32> =
            HotQueue::with_store("testqueue", BincodeSerializer, store.clone()).unwrap();
        queue.put(&5).await.unwrap();
        store.fail_pops.store(true, Ordering::SeqCst);

        let results: Vec<_> = queue
            .consume(GetOptions::new())
            .into_stream()
            .collect()
            .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}

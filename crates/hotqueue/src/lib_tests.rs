//! Crate-level tests using only the root re-exports.

use super::*;
use std::sync::Arc;

#[tokio::test]
async fn test_queue_round_trip_through_public_api() {
    let store: Arc<dyn ListStore> = Arc::new(InMemoryStore::default());
    let queue: HotQueue<String> =
        HotQueue::with_store("testqueue", BincodeSerializer, store).unwrap();

    assert_eq!(queue.key().as_str(), format!("{}:testqueue", KEY_PREFIX));
    assert_eq!(key_for_name(queue.name()), *queue.key());

    queue
        .bulk(Some(2), async {
            queue.put(&"first".to_string()).await?;
            queue.put(&"second".to_string()).await?;
            queue.put(&"third".to_string()).await
        })
        .await
        .unwrap();

    let mut received = Vec::new();
    let handled = queue
        .worker_with(WorkerConfig::new().block(false), |message: String| {
            received.push(message)
        })
        .run()
        .await
        .unwrap();

    assert_eq!(handled, 3);
    assert_eq!(received, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_store_can_be_connected_from_config() {
    let store = connect_store(&StoreConfig::InMemory(InMemoryConfig::default()))
        .await
        .unwrap();

    assert_eq!(store.store_type(), StoreType::InMemory);
}

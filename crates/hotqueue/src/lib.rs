//! # HotQueue
//!
//! Simple FIFO message queue stored in a Redis list.
//!
//! This library provides:
//! - Put/get against a single named queue, with blocking gets and timeouts
//! - Lazy consumers and handler-driven workers
//! - Pluggable message serialization (bincode by default, JSON, or raw)
//! - Client-side bulk batching of puts
//!
//! Ordering and blocking are delegated entirely to the store's atomic list
//! commands; the client adds no scheduling of its own.
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`key`] - Queue names and the store keys derived from them
//! - [`serializer`] - Message serializers
//! - [`provider`] - Store types and configuration
//! - [`store`] - The list store seam
//! - [`providers`] - Redis and in-memory list stores
//! - [`client`] - The queue client
//! - [`bulk`] - Bulk put batching
//! - [`consumer`] - Get options and the consume sequence
//! - [`worker`] - Handler-driven workers

// Module declarations
pub mod bulk;
pub mod client;
pub mod consumer;
pub mod error;
pub mod key;
pub mod provider;
pub mod providers;
pub mod serializer;
pub mod store;
pub mod worker;

// Re-export commonly used types at crate root for convenience
pub use bulk::BulkScope;
pub use client::{HotQueue, HotQueueBuilder, DEFAULT_BULK_SIZE};
pub use consumer::{Consumer, GetOptions};
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use key::{key_for_name, QueueKey, QueueName, KEY_PREFIX};
pub use provider::{InMemoryConfig, QueueSettings, RedisConfig, StoreConfig, StoreType};
pub use providers::{InMemoryStore, RedisStore};
pub use serializer::{BincodeSerializer, JsonSerializer, NoSerializer, Serializer};
pub use store::{connect_store, ListStore};
pub use worker::{MessageHandler, Worker, WorkerConfig};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

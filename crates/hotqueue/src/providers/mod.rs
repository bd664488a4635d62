//! List store implementations.
//!
//! This module contains concrete implementations of the `ListStore` trait
//! for different backends.

pub mod memory;
pub mod redis;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;

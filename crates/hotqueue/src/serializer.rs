//! Message serializers.
//!
//! A [`Serializer`] turns application values into the bytes stored in the
//! queue's list and back again. Three implementations ship with the crate:
//!
//! - [`BincodeSerializer`] - compact binary encoding of any serde type, the
//!   default for new queues
//! - [`JsonSerializer`] - JSON encoding, readable by producers and consumers
//!   written in other languages
//! - [`NoSerializer`] - stores raw payloads untouched (`Bytes`, `Vec<u8>`,
//!   `String`)

use crate::error::SerializationError;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode/decode pair converting messages to and from their stored form
pub trait Serializer<T>: Send + Sync {
    /// Convert a message into the bytes pushed onto the list
    fn encode(&self, message: &T) -> Result<Bytes, SerializationError>;

    /// Convert bytes popped from the list back into a message
    fn decode(&self, payload: &[u8]) -> Result<T, SerializationError>;
}

/// Binary serializer backed by bincode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BincodeSerializer;

impl<T> Serializer<T> for BincodeSerializer
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, message: &T) -> Result<Bytes, SerializationError> {
        Ok(Bytes::from(bincode::serialize(message)?))
    }

    fn decode(&self, payload: &[u8]) -> Result<T, SerializationError> {
        Ok(bincode::deserialize(payload)?)
    }
}

/// JSON serializer backed by serde_json
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonSerializer;

impl<T> Serializer<T> for JsonSerializer
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, message: &T) -> Result<Bytes, SerializationError> {
        Ok(Bytes::from(serde_json::to_vec(message)?))
    }

    fn decode(&self, payload: &[u8]) -> Result<T, SerializationError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Pass-through serializer for payloads the store can hold as-is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoSerializer;

impl Serializer<Bytes> for NoSerializer {
    fn encode(&self, message: &Bytes) -> Result<Bytes, SerializationError> {
        Ok(message.clone())
    }

    fn decode(&self, payload: &[u8]) -> Result<Bytes, SerializationError> {
        Ok(Bytes::copy_from_slice(payload))
    }
}

impl Serializer<Vec<u8>> for NoSerializer {
    fn encode(&self, message: &Vec<u8>) -> Result<Bytes, SerializationError> {
        Ok(Bytes::copy_from_slice(message))
    }

    fn decode(&self, payload: &[u8]) -> Result<Vec<u8>, SerializationError> {
        Ok(payload.to_vec())
    }
}

impl Serializer<String> for NoSerializer {
    fn encode(&self, message: &String) -> Result<Bytes, SerializationError> {
        Ok(Bytes::copy_from_slice(message.as_bytes()))
    }

    fn decode(&self, payload: &[u8]) -> Result<String, SerializationError> {
        String::from_utf8(payload.to_vec()).map_err(|_| SerializationError::InvalidUtf8)
    }
}

#[cfg(test)]
#[path = "serializer_tests.rs"]
mod tests;

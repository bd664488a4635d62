//! Queue identity: logical queue names and the store keys derived from them.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Prefix shared by every queue key in the store
pub const KEY_PREFIX: &str = "hotqueue";

/// Logical queue name chosen by the application
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name, rejecting empty names
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::Required {
                field: "queue_name".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Physical store key for this queue
    pub fn key(&self) -> QueueKey {
        QueueKey::for_name(self)
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Store key holding a queue's list, `hotqueue:<name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKey(String);

impl QueueKey {
    /// Derive the key for a queue name
    pub fn for_name(name: &QueueName) -> Self {
        Self(format!("{}:{}", KEY_PREFIX, name.as_str()))
    }

    /// Parse a raw store key back into a queue key.
    ///
    /// Keys outside the `hotqueue:` namespace, or with nothing after the
    /// prefix, are rejected.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let name = raw
            .strip_prefix(KEY_PREFIX)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "queue_key".to_string(),
                message: format!("expected '{}:<name>'", KEY_PREFIX),
            })?;

        Ok(Self::for_name(&QueueName::new(name)?))
    }

    /// Recover the logical queue name from the key
    pub fn queue_name(&self) -> QueueName {
        // The prefix is always present, the constructors guarantee it.
        QueueName(self.0[KEY_PREFIX.len() + 1..].to_string())
    }

    /// Get key as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Return the key used to store the given queue name
pub fn key_for_name(name: &QueueName) -> QueueKey {
    QueueKey::for_name(name)
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;

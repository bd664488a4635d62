//! Store types and configuration.

use crate::client::DEFAULT_BULK_SIZE;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Enumeration of supported list stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreType {
    Redis,
    InMemory,
}

/// Store-specific configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreConfig {
    Redis(RedisConfig),
    InMemory(InMemoryConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Redis(RedisConfig::default())
    }
}

impl StoreConfig {
    /// Get the store type this configuration selects
    pub fn store_type(&self) -> StoreType {
        match self {
            Self::Redis(_) => StoreType::Redis,
            Self::InMemory(_) => StoreType::InMemory,
        }
    }
}

/// Redis connection configuration.
///
/// Either a complete `url` or the discrete host/port/db/credential fields
/// may be given; `url` wins when both are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connection_timeout_secs: u64,
    /// Defer connecting until the first queue operation
    pub lazy_connect: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            username: None,
            password: None,
            connection_timeout_secs: 5,
            lazy_connect: false,
        }
    }
}

impl RedisConfig {
    /// Configuration pointing at a complete `redis://` URL
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Build the connection URL handed to the Redis client
    pub fn connection_url(&self) -> Result<String, ConfigurationError> {
        if let Some(url) = &self.url {
            let parsed = Url::parse(url).map_err(|e| ConfigurationError::Parsing {
                message: format!("invalid redis url: {}", e),
            })?;
            return match parsed.scheme() {
                "redis" | "rediss" | "redis+unix" | "unix" => Ok(url.clone()),
                other => Err(ConfigurationError::Invalid {
                    message: format!("unsupported redis url scheme '{}'", other),
                }),
            };
        }

        self.validate()?;

        let mut url = Url::parse(&format!("redis://{}:{}/{}", self.host, self.port, self.db))
            .map_err(|e| ConfigurationError::Parsing {
                message: format!("invalid redis host '{}': {}", self.host, e),
            })?;

        if let Some(username) = &self.username {
            url.set_username(username)
                .map_err(|_| ConfigurationError::Invalid {
                    message: "redis username cannot be set on this url".to_string(),
                })?;
        }
        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|_| ConfigurationError::Invalid {
                    message: "redis password cannot be set on this url".to_string(),
                })?;
        }

        Ok(url.into())
    }

    /// Connection target with credentials removed, safe for logs and errors
    pub fn redacted_target(&self) -> String {
        match &self.url {
            Some(url) => match Url::parse(url) {
                Ok(mut parsed) => {
                    // Credentials are best-effort removed; unix urls have none.
                    let _ = parsed.set_password(None);
                    let _ = parsed.set_username("");
                    parsed.into()
                }
                Err(_) => "<invalid url>".to_string(),
            },
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// Validate the discrete connection fields
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.url.is_some() {
            return Ok(());
        }
        if self.host.is_empty() {
            return Err(ConfigurationError::Missing {
                key: "store.redis.host".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigurationError::Invalid {
                message: "redis port must be non-zero".to_string(),
            });
        }
        if self.db < 0 {
            return Err(ConfigurationError::Invalid {
                message: format!("redis db index must be non-negative, got {}", self.db),
            });
        }
        Ok(())
    }
}

/// In-memory store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryConfig {
    /// Upper bound on entries per list; pushes beyond it are rejected
    pub max_queue_size: Option<usize>,
}

/// Complete settings for one queue client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    pub name: String,
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_bulk_size() -> usize {
    DEFAULT_BULK_SIZE
}

impl QueueSettings {
    /// Environment prefix for settings overrides, e.g. `HOTQUEUE__STORE__REDIS__PORT`
    pub const ENV_PREFIX: &'static str = "HOTQUEUE";

    /// Settings for a named queue with default store and bulk size
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bulk_size: DEFAULT_BULK_SIZE,
            store: StoreConfig::default(),
        }
    }

    /// Load settings from an optional file, then `HOTQUEUE__*` environment variables.
    ///
    /// The file format follows its extension (`.yaml`, `.toml`, `.json`).
    /// Later sources override earlier ones.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        let settings: Self = config
            .try_deserialize()
            .map_err(|e| ConfigurationError::Parsing {
                message: e.to_string(),
            })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings before a client is built from them
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.is_empty() {
            return Err(ConfigurationError::Missing {
                key: "name".to_string(),
            });
        }
        if self.bulk_size == 0 {
            return Err(ConfigurationError::Invalid {
                message: "bulk_size must be at least 1".to_string(),
            });
        }
        if let StoreConfig::Redis(redis) = &self.store {
            redis.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;

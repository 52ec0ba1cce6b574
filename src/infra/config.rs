use std::{env, fmt::Display, str::FromStr, sync::Arc};

use thiserror::Error;
use tracing::{info, warn};

use super::mongo::MongoRep;
use super::store::{DocumentStore, InMemoryStore, StoreError, WriteMode};

pub const MEMORY_URI: &str = "memory://";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key} value {value}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `mongodb://...`, or `memory://` for a process-local store.
    pub store_uri: String,
    pub database: String,
    pub write_mode: WriteMode,
    pub conflict_retries: u32,
}

impl Config {
    /// Reads the environment, after loading `.env` if there is one.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenv::dotenv() {
            info!("No .env file loaded: {e}");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            store_uri: try_load(&lookup, "STORE_URI", "mongodb://localhost:27017/")?,
            database: try_load(&lookup, "STORE_DATABASE", "recipes")?,
            write_mode: try_load(&lookup, "WRITE_MODE", "cas")?,
            conflict_retries: try_load(&lookup, "CONFLICT_RETRIES", "3")?,
        })
    }

    pub fn open_store(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        if self.store_uri.starts_with(MEMORY_URI) {
            warn!("Using in-memory store, data is lost on shutdown");
            return Ok(Arc::new(InMemoryStore::new()));
        }
        info!("Connecting to {}/{}", self.store_uri, self.database);
        Ok(Arc::new(MongoRep::init(&self.store_uri, &self.database)?))
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    value.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key: key.to_string(),
            value: value.clone(),
            reason: e.to_string(),
        }
    })
}

//! Desk configuration: TOML file plus environment overrides.
//!
//! ```toml
//! availability = "replay"
//!
//! [inventory]
//! vip = 3
//! regular = 5
//!
//! [storage]
//! backend = "jsonl"
//! path = "data"
//!
//! [runtime]
//! command_queue_bound = 256
//! event_capacity = 1024
//! ```
//!
//! Every key is optional. After the file is read, `TICKETLINE_DATA`,
//! `TICKETLINE_VIP_TICKETS`, `TICKETLINE_REGULAR_TICKETS` and
//! `TICKETLINE_AVAILABILITY` override the matching values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    core::manager::QueueManager,
    inventory::AvailabilityMode,
    persist::{
        PersistResult, Storage, jsonl::JsonlStorage, memory::MemoryStorage, sqlite::SqliteStorage,
    },
    runtime::handle::RuntimeConfig,
    types::Inventory,
};

/// Environment variable overriding [`StorageConfig::path`].
pub const ENV_DATA: &str = "TICKETLINE_DATA";
/// Environment variable overriding [`Inventory::vip`].
pub const ENV_VIP_TICKETS: &str = "TICKETLINE_VIP_TICKETS";
/// Environment variable overriding [`Inventory::regular`].
pub const ENV_REGULAR_TICKETS: &str = "TICKETLINE_REGULAR_TICKETS";
/// Environment variable overriding [`DeskConfig::availability`].
pub const ENV_AVAILABILITY: &str = "TICKETLINE_AVAILABILITY";

/// Failure loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("{path}: {source}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for [`DeskConfig`].
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    /// An environment override did not parse.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Env {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Parse failure.
        reason: String,
    },
}

/// Which [`Storage`] implementation backs the desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Flat JSONL files in a data directory.
    #[default]
    Jsonl,
    /// One SQLite database file.
    Sqlite,
    /// Nothing persisted.
    Memory,
}

/// Where and how desk state is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage implementation.
    pub backend: Backend,
    /// Data directory for `jsonl`, database file for `sqlite`; unused by `memory`.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Jsonl,
            path: PathBuf::from("data"),
        }
    }
}

impl StorageConfig {
    /// Opens the configured backend.
    pub fn open(&self) -> PersistResult<Box<dyn Storage>> {
        Ok(match self.backend {
            Backend::Jsonl => Box::new(JsonlStorage::open(&self.path)?),
            Backend::Sqlite => Box::new(SqliteStorage::open(&self.path)?),
            Backend::Memory => Box::new(MemoryStorage::new()),
        })
    }
}

/// Top-level desk configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Starting ticket counts.
    pub inventory: Inventory,
    /// How remaining tickets are derived.
    pub availability: AvailabilityMode,
    /// Storage backend and location.
    pub storage: StorageConfig,
    /// Desk loop channel sizes.
    pub runtime: RuntimeConfig,
}

impl DeskConfig {
    /// Parses a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads `path`, or starts from defaults when `path` is `None`, then
    /// applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides looked up through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup(ENV_DATA) {
            self.storage.path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_VIP_TICKETS) {
            self.inventory.vip = parse_count(ENV_VIP_TICKETS, raw)?;
        }
        if let Some(raw) = lookup(ENV_REGULAR_TICKETS) {
            self.inventory.regular = parse_count(ENV_REGULAR_TICKETS, raw)?;
        }
        if let Some(raw) = lookup(ENV_AVAILABILITY) {
            self.availability = raw.parse().map_err(|reason| ConfigError::Env {
                key: ENV_AVAILABILITY,
                value: raw.clone(),
                reason,
            })?;
        }
        Ok(())
    }

    /// Opens storage and builds the manager this configuration describes.
    pub fn build_manager(&self) -> PersistResult<QueueManager<Box<dyn Storage>>> {
        let storage = self.storage.open()?;
        Ok(QueueManager::new(storage, self.inventory, self.availability))
    }
}

fn parse_count(key: &'static str, raw: String) -> Result<u32, ConfigError> {
    raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
        key,
        reason: e.to_string(),
        value: raw,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = DeskConfig::from_toml_str("").unwrap();
        assert_eq!(config, DeskConfig::default());
        assert_eq!(config.inventory, Inventory::new(3, 5));
        assert_eq!(config.availability, AvailabilityMode::Replay);
        assert_eq!(config.storage.backend, Backend::Jsonl);
    }

    #[test]
    fn parses_full_file() {
        let config = DeskConfig::from_toml_str(
            r#"
            availability = "counter"

            [inventory]
            vip = 10
            regular = 20

            [storage]
            backend = "sqlite"
            path = "/tmp/desk.db"

            [runtime]
            event_capacity = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.availability, AvailabilityMode::Counter);
        assert_eq!(config.inventory, Inventory::new(10, 20));
        assert_eq!(config.storage.backend, Backend::Sqlite);
        assert_eq!(config.runtime.event_capacity, 16);
        assert_eq!(config.runtime.command_queue_bound, 256);
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(DeskConfig::from_toml_str("[storage]\nbackend = \"csv\"\n").is_err());
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_VIP_TICKETS, "7"),
            (ENV_AVAILABILITY, "Counter"),
            (ENV_DATA, "elsewhere"),
        ]);
        let mut config = DeskConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.inventory, Inventory::new(7, 5));
        assert_eq!(config.availability, AvailabilityMode::Counter);
        assert_eq!(config.storage.path, PathBuf::from("elsewhere"));
    }

    #[test]
    fn bad_env_count_names_the_variable() {
        let mut config = DeskConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_REGULAR_TICKETS).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_REGULAR_TICKETS));
    }
}

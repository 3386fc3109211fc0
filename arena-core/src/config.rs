//! Configuration for the arena service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Arena configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// HTTP listen address
    pub http_listen_addr: String,

    /// Populate the standard game catalog at startup when the store is empty
    pub seed_on_start: bool,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Writer actor configuration
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/arena"),
            service_name: "arena-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            http_listen_addr: "0.0.0.0:8080".to_string(),
            seed_on_start: true,
            rocksdb: RocksDBConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// fsync every committed batch
    pub sync_writes: bool,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            sync_writes: true,
            enable_statistics: false,
        }
    }
}

/// Writer actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox size; senders wait when it is full
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML text; missing keys fall back to defaults
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("ARENA_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(addr) = std::env::var("ARENA_HTTP_ADDR") {
            config.http_listen_addr = addr;
        }

        if let Ok(seed) = std::env::var("ARENA_SEED_ON_START") {
            config.seed_on_start = seed.parse().map_err(|_| {
                crate::Error::Config(format!("ARENA_SEED_ON_START must be true or false, got {}", seed))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be greater than zero".to_string(),
            ));
        }
        if self.http_listen_addr.is_empty() {
            return Err(crate::Error::Config("http_listen_addr is empty".to_string()));
        }
        Ok(())
    }
}

// SPDX-FileCopyrightText: 2026 The Registry Authors
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use registry_store_db::PoolConfig;

use crate::error::{IoContext, Result, ServiceError};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "REGISTRY_STORE_CONFIG";

/// Configuration file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "registry-store.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,

    /// JSON array of servers imported at start-up
    pub seed_file: Option<PathBuf>,

    pub database: DatabaseConfig,

    pub listing: ListingConfig,

    pub publish: PublishConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database
    pub path: PathBuf,

    /// Connections kept open while idle
    pub min_connections: usize,

    /// Ceiling on concurrently open connections
    pub max_connections: usize,

    pub max_idle_time_secs: u64,

    pub max_lifetime_secs: u64,

    pub acquire_timeout_secs: u64,

    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListingConfig {
    pub default_limit: i64,
    pub min_limit: i64,
    pub max_limit: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Publishing fails once a server has this many versions
    pub max_versions_per_server: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            seed_file: None,
            database: DatabaseConfig::default(),
            listing: ListingConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let pool = PoolConfig::default();
        Self {
            path: PathBuf::from("/var/lib/registry/registry.sqlite"),
            min_connections: pool.min_connections,
            max_connections: pool.max_connections,
            max_idle_time_secs: pool.max_idle_time.as_secs(),
            max_lifetime_secs: pool.max_lifetime.as_secs(),
            acquire_timeout_secs: pool.acquire_timeout.as_secs(),
            busy_timeout_ms: pool.busy_timeout.as_millis() as u64,
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: 30,
            min_limit: 1,
            max_limit: 100,
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_versions_per_server: 10_000,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .io_context(|| format!("Failed to read config file at {}", path.display()))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `$REGISTRY_STORE_CONFIG`, then `./registry-store.toml`,
    /// falling back to defaults.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let db = &self.database;
        if db.max_connections == 0 {
            return Err(ServiceError::config("database.max_connections must be positive"));
        }
        if db.min_connections > db.max_connections {
            return Err(ServiceError::config(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                db.min_connections, db.max_connections
            )));
        }

        let listing = &self.listing;
        if listing.min_limit <= 0 {
            return Err(ServiceError::config("listing.min_limit must be positive"));
        }
        if listing.min_limit > listing.max_limit {
            return Err(ServiceError::config(format!(
                "listing.min_limit ({}) exceeds max_limit ({})",
                listing.min_limit, listing.max_limit
            )));
        }
        if !(listing.min_limit..=listing.max_limit).contains(&listing.default_limit) {
            return Err(ServiceError::config(format!(
                "listing.default_limit ({}) is outside [{}, {}]",
                listing.default_limit, listing.min_limit, listing.max_limit
            )));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            min_connections: self.min_connections,
            max_connections: self.max_connections,
            max_idle_time: Duration::from_secs(self.max_idle_time_secs),
            max_lifetime: Duration::from_secs(self.max_lifetime_secs),
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

impl ListingConfig {
    /// Page size for a requested limit.
    pub fn clamp(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(limit) => limit.clamp(self.min_limit, self.max_limit),
            None => self.default_limit,
        }
    }
}

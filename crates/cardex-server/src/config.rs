//! Configuration management

use cardex_common::types::{
    Cadence, ExclusionRules, DEFAULT_DIGITAL_PREFIXES, DEFAULT_SET_DENYLIST,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

// ============================================================================
// Database Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/cardex";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

// ============================================================================
// Sync Configuration Constants
// ============================================================================

/// Default bulk catalog source.
pub const DEFAULT_CATALOG_URL: &str = "https://mtgjson.com/api/v5/AllPrintings.json.gz";

/// Default bulk price source (current day only).
pub const DEFAULT_PRICE_URL: &str = "https://mtgjson.com/api/v5/AllPricesToday.json.gz";

/// Records per persistence batch.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Decoded records allowed in flight between decoder and writer.
pub const DEFAULT_DECODE_BUFFER: usize = 64;

/// Catalog refresh threshold (weekly).
pub const DEFAULT_CATALOG_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Price refresh threshold (daily).
pub const DEFAULT_PRICE_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// How often the scheduler re-evaluates both cadences (hourly).
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 60 * 60;

/// Delay before the first scheduler tick after startup.
pub const DEFAULT_STARTUP_DELAY_SECS: u64 = 10;

/// HTTP connect timeout; body transfer has no deadline.
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Language whose foreign-data entry becomes the localized name.
pub const DEFAULT_LOCALIZED_LANGUAGE: &str = "Japanese";

/// Log a progress line every this many batches.
pub const DEFAULT_PROGRESS_EVERY_BATCHES: u64 = 20;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Catalog and price synchronization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whether the daemon runs the background scheduler
    pub enabled: bool,
    pub catalog_url: String,
    pub price_url: String,
    /// Directory holding downloaded bulk files while a cycle runs
    pub data_dir: PathBuf,
    pub batch_size: usize,
    pub decode_buffer: usize,
    pub catalog_interval_secs: u64,
    pub price_interval_secs: u64,
    pub tick_interval_secs: u64,
    pub startup_delay_secs: u64,
    pub http_connect_timeout_secs: u64,
    pub localized_language: String,
    /// Case-insensitive set-name substrings marking digital-only sets
    pub set_denylist: Vec<String>,
    /// Name prefixes marking digital card variants
    pub digital_prefixes: Vec<String>,
    pub progress_every_batches: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_list_or(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            database: DatabaseConfig::from_env(),
            sync: SyncConfig::from_env(),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.database.validate()?;
        self.sync.validate()?;
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS),
            min_connections: env_or("DATABASE_MIN_CONNECTIONS", DEFAULT_DATABASE_MIN_CONNECTIONS),
            connect_timeout_secs: env_or(
                "DATABASE_CONNECT_TIMEOUT",
                DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            ),
            idle_timeout_secs: env_or("DATABASE_IDLE_TIMEOUT", DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.min_connections > self.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.min_connections,
                self.max_connections
            );
        }

        Ok(())
    }
}

impl SyncConfig {
    /// Load sync configuration from `CARDEX_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            enabled: env_or("CARDEX_SYNC_ENABLED", defaults.enabled),
            catalog_url: std::env::var("CARDEX_CATALOG_URL").unwrap_or(defaults.catalog_url),
            price_url: std::env::var("CARDEX_PRICE_URL").unwrap_or(defaults.price_url),
            data_dir: std::env::var("CARDEX_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            batch_size: env_or("CARDEX_BATCH_SIZE", defaults.batch_size),
            decode_buffer: env_or("CARDEX_DECODE_BUFFER", defaults.decode_buffer),
            catalog_interval_secs: env_or(
                "CARDEX_CATALOG_INTERVAL_SECS",
                defaults.catalog_interval_secs,
            ),
            price_interval_secs: env_or("CARDEX_PRICE_INTERVAL_SECS", defaults.price_interval_secs),
            tick_interval_secs: env_or("CARDEX_TICK_INTERVAL_SECS", defaults.tick_interval_secs),
            startup_delay_secs: env_or("CARDEX_STARTUP_DELAY_SECS", defaults.startup_delay_secs),
            http_connect_timeout_secs: env_or(
                "CARDEX_HTTP_CONNECT_TIMEOUT_SECS",
                defaults.http_connect_timeout_secs,
            ),
            localized_language: std::env::var("CARDEX_LOCALIZED_LANGUAGE")
                .unwrap_or(defaults.localized_language),
            set_denylist: env_list_or("CARDEX_SET_DENYLIST", DEFAULT_SET_DENYLIST),
            digital_prefixes: env_list_or("CARDEX_DIGITAL_PREFIXES", DEFAULT_DIGITAL_PREFIXES),
            progress_every_batches: env_or(
                "CARDEX_PROGRESS_EVERY_BATCHES",
                defaults.progress_every_batches,
            ),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.catalog_url.is_empty() {
            anyhow::bail!("CARDEX_CATALOG_URL cannot be empty");
        }
        if self.price_url.is_empty() {
            anyhow::bail!("CARDEX_PRICE_URL cannot be empty");
        }
        if self.batch_size == 0 {
            anyhow::bail!("CARDEX_BATCH_SIZE must be greater than 0");
        }
        if self.decode_buffer == 0 {
            anyhow::bail!("CARDEX_DECODE_BUFFER must be greater than 0");
        }
        if self.catalog_interval_secs == 0 || self.price_interval_secs == 0 {
            anyhow::bail!("Cadence intervals must be greater than 0");
        }
        if self.tick_interval_secs == 0 {
            anyhow::bail!("CARDEX_TICK_INTERVAL_SECS must be greater than 0");
        }
        self.exclusion_rules()?;
        Ok(())
    }

    /// Minimum checkpoint age before a cadence runs again
    pub fn threshold(&self, cadence: Cadence) -> chrono::Duration {
        let secs = match cadence {
            Cadence::Catalog => self.catalog_interval_secs,
            Cadence::Price => self.price_interval_secs,
        };
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
    }

    /// Source URL for a cadence
    pub fn source_url(&self, cadence: Cadence) -> &str {
        match cadence {
            Cadence::Catalog => &self.catalog_url,
            Cadence::Price => &self.price_url,
        }
    }

    /// Where a cadence's bulk file is downloaded to
    pub fn download_path(&self, cadence: Cadence) -> PathBuf {
        match cadence {
            Cadence::Catalog => self.data_dir.join("AllPrintings.json.gz"),
            Cadence::Price => self.data_dir.join("AllPricesToday.json.gz"),
        }
    }

    pub fn exclusion_rules(&self) -> anyhow::Result<ExclusionRules> {
        Ok(ExclusionRules::new(
            self.set_denylist.as_slice(),
            self.digital_prefixes.as_slice(),
        )?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn http_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http_connect_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        let data_dir = if cfg!(windows) {
            std::env::temp_dir().join("cardex-sync")
        } else {
            PathBuf::from("/tmp/cardex-sync")
        };

        Self {
            enabled: true,
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            price_url: DEFAULT_PRICE_URL.to_string(),
            data_dir,
            batch_size: DEFAULT_BATCH_SIZE,
            decode_buffer: DEFAULT_DECODE_BUFFER,
            catalog_interval_secs: DEFAULT_CATALOG_INTERVAL_SECS,
            price_interval_secs: DEFAULT_PRICE_INTERVAL_SECS,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            startup_delay_secs: DEFAULT_STARTUP_DELAY_SECS,
            http_connect_timeout_secs: DEFAULT_HTTP_CONNECT_TIMEOUT_SECS,
            localized_language: DEFAULT_LOCALIZED_LANGUAGE.to_string(),
            set_denylist: DEFAULT_SET_DENYLIST.iter().map(|s| s.to_string()).collect(),
            digital_prefixes: DEFAULT_DIGITAL_PREFIXES.iter().map(|s| s.to_string()).collect(),
            progress_every_batches: DEFAULT_PROGRESS_EVERY_BATCHES,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

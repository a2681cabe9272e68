//! Configuration file support for ordersync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `ORDERSYNC_`, sections separated by
//!    a double underscore, e.g. `ORDERSYNC_STORE__CONSUMER_KEY`)
//! 3. Config file (~/.config/ordersync/config.toml or ./ordersync.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/ordersync/ordersync.db`
//! on Linux (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/ordersync/ordersync.db"  # optional, this is the default
//! record = "order_history"
//!
//! [store]
//! url = "https://shop.example.com"
//! consumer_key = "ck_..."     # or ORDERSYNC_STORE__CONSUMER_KEY
//! consumer_secret = "cs_..."  # or ORDERSYNC_STORE__CONSUMER_SECRET
//!
//! [ingestion]
//! endpoint = "https://ingest.example.com/api"
//! site_id = "shop-1"
//! api_token = "..."  # or ORDERSYNC_INGESTION__API_TOKEN
//!
//! [sync]
//! page_size = 20
//! batch_size = 50
//! stale_after = 300       # seconds
//! max_retries = 3
//! cogs_meta_key = "_wc_cog_cost"
//! cogs_default_percentage = 35.0
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use ordersync::ingest::IngestionConfig;
use ordersync::retry::{DEFAULT_MAX_ATTEMPTS, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS};
use ordersync::source::WooCommerceConfig;
use ordersync::store::DEFAULT_RECORD_NAME;
use ordersync::sync::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_DELAY, DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_STALE_AFTER, SyncConfig as EngineConfig,
};
use ordersync::transform::{DEFAULT_COGS_META_KEY, DEFAULT_EXCLUDED_STATUSES};
use serde::Deserialize;

/// A required setting is absent.
#[derive(Debug)]
pub struct MissingSetting {
    pub key: &'static str,
    pub env: &'static str,
}

impl std::fmt::Display for MissingSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "missing setting `{}` (set it in ordersync.toml or via {})",
            self.key, self.env
        )
    }
}

impl std::error::Error for MissingSetting {}

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// WooCommerce store the history is read from.
    pub store: StoreConfig,
    /// Ingestion endpoint the history is delivered to.
    pub ingestion: IngestionSection,
    /// Sync tunables.
    pub sync: SyncConfig,
}

/// Database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    /// Defaults to `sqlite://~/.local/state/ordersync/ordersync.db` if not specified.
    pub url: Option<String>,
    /// Name of the progress record (one per synced store).
    pub record: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            record: DEFAULT_RECORD_NAME.to_string(),
        }
    }
}

/// WooCommerce store configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store base URL (e.g., "https://shop.example.com").
    pub url: Option<String>,
    /// REST API consumer key.
    pub consumer_key: Option<String>,
    /// REST API consumer secret.
    pub consumer_secret: Option<String>,
}

/// Ingestion endpoint configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IngestionSection {
    /// Base URL; batches go to `{endpoint}/v1/orders/batch`.
    pub endpoint: Option<String>,
    pub site_id: Option<String>,
    pub api_token: Option<String>,
}

/// Sync tunables. Durations are whole seconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Line item meta key holding the unit cost. Empty disables meta lookup.
    pub cogs_meta_key: String,
    /// Fallback cost as a percentage of the line subtotal.
    pub cogs_default_percentage: Option<f64>,
    pub excluded_statuses: Vec<String>,
    pub page_size: u32,
    pub batch_size: usize,
    pub stale_after: u64,
    pub max_retries: usize,
    pub min_backoff: u64,
    pub max_backoff: u64,
    pub request_timeout: u64,
    pub chunk_delay: u64,
    /// How often `work` polls an empty queue.
    pub poll_interval: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cogs_meta_key: DEFAULT_COGS_META_KEY.to_string(),
            cogs_default_percentage: None,
            excluded_statuses: DEFAULT_EXCLUDED_STATUSES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            stale_after: DEFAULT_STALE_AFTER.as_secs(),
            max_retries: DEFAULT_MAX_ATTEMPTS,
            min_backoff: INITIAL_BACKOFF_MS.div_ceil(1000),
            max_backoff: MAX_BACKOFF_MS / 1000,
            request_timeout: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            chunk_delay: DEFAULT_CHUNK_DELAY.as_secs(),
            poll_interval: DEFAULT_POLL_INTERVAL.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/ordersync/config.toml)
    /// 3. Local config file (./ordersync.toml)
    /// 4. Environment variables with ORDERSYNC_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "ordersync") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        // Local config file (higher priority than XDG)
        let local_config = PathBuf::from("ordersync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./ordersync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., ORDERSYNC_DATABASE__URL -> database.url
        builder = builder.add_source(env_source());

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter enables read-write access and creates the file
    /// if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("ordersync.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    /// WooCommerce source settings; all three store settings are required.
    pub fn woocommerce(&self) -> Result<WooCommerceConfig, MissingSetting> {
        Ok(WooCommerceConfig {
            store_url: required(&self.store.url, "store.url", "ORDERSYNC_STORE__URL")?,
            consumer_key: required(
                &self.store.consumer_key,
                "store.consumer_key",
                "ORDERSYNC_STORE__CONSUMER_KEY",
            )?,
            consumer_secret: required(
                &self.store.consumer_secret,
                "store.consumer_secret",
                "ORDERSYNC_STORE__CONSUMER_SECRET",
            )?,
            timeout: Duration::from_secs(self.sync.request_timeout),
        })
    }

    /// Ingestion client settings, sharing the sync retry policy.
    pub fn ingestion(&self) -> Result<IngestionConfig, MissingSetting> {
        let engine = self.engine();
        Ok(IngestionConfig {
            endpoint: required(
                &self.ingestion.endpoint,
                "ingestion.endpoint",
                "ORDERSYNC_INGESTION__ENDPOINT",
            )?,
            site_id: required(
                &self.ingestion.site_id,
                "ingestion.site_id",
                "ORDERSYNC_INGESTION__SITE_ID",
            )?,
            api_token: required(
                &self.ingestion.api_token,
                "ingestion.api_token",
                "ORDERSYNC_INGESTION__API_TOKEN",
            )?,
            timeout: engine.request_timeout,
            retry: engine.retry_config(),
        })
    }

    /// The library's typed sync configuration.
    pub fn engine(&self) -> EngineConfig {
        let sync = &self.sync;
        let meta_key = sync.cogs_meta_key.trim();
        EngineConfig {
            cogs_meta_key: (!meta_key.is_empty()).then(|| meta_key.to_string()),
            cogs_default_percentage: sync.cogs_default_percentage,
            excluded_statuses: sync.excluded_statuses.clone(),
            page_size: sync.page_size,
            batch_size: sync.batch_size,
            stale_after: Duration::from_secs(sync.stale_after),
            max_retries: sync.max_retries,
            min_backoff: Duration::from_secs(sync.min_backoff),
            max_backoff: Duration::from_secs(sync.max_backoff),
            request_timeout: Duration::from_secs(sync.request_timeout),
            chunk_delay: Duration::from_secs(sync.chunk_delay),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.poll_interval.max(1))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/ordersync` or `~/.local/state/ordersync`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ordersync").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("ORDERSYNC")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn required(
    value: &Option<String>,
    key: &'static str,
    env: &'static str,
) -> Result<String, MissingSetting> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(MissingSetting { key, env }),
    }
}

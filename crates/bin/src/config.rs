//! TOML configuration for the `cairns` binary.
//!
//! Every field has a default, so an empty or missing file is valid. The
//! `TUSHARE_TOKEN` environment variable takes precedence over `[tushare] token`.

use crate::logging::LogFormat;
use cairns_data::export::DEFAULT_BATCH_SIZE;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file read when `--config` is not given and the file exists.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "cairns.toml";

/// Environment variable overriding the provider token.
pub(crate) const TOKEN_ENV: &str = "TUSHARE_TOKEN";

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid TOML for this layout
    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) store: StoreConfig,
    pub(crate) tushare: TushareConfig,
    pub(crate) data: DataConfig,
    pub(crate) features: FeaturesConfig,
    pub(crate) logging: LoggingConfig,
}

/// `[store]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StoreConfig {
    /// SQLite file; defaults to the platform data directory
    pub(crate) path: Option<PathBuf>,
}

/// `[tushare]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct TushareConfig {
    pub(crate) token: Option<String>,
    pub(crate) base_url: Option<String>,
    /// Delay between provider calls in milliseconds
    pub(crate) rate_limit_ms: u64,
}

impl Default for TushareConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: None,
            rate_limit_ms: 300,
        }
    }
}

/// `[data]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct DataConfig {
    /// Directory of Parquet snapshots
    pub(crate) data_path: PathBuf,
    /// Rows per store read during export
    pub(crate) batch_size: usize,
    /// Code prefixes kept on export; empty keeps everything
    pub(crate) code_prefixes: Vec<String>,
    /// First day of full downloads, `YYYYMMDD`
    pub(crate) start_date: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data"),
            batch_size: DEFAULT_BATCH_SIZE,
            code_prefixes: Vec::new(),
            start_date: "20160101".to_string(),
        }
    }
}

impl DataConfig {
    /// Snapshot written by the download export.
    pub(crate) fn snapshot_path(&self) -> PathBuf {
        self.data_path.join("stock_data.parquet")
    }

    /// Output of feature method `method`.
    pub(crate) fn feature_path(&self, method: u8) -> PathBuf {
        self.data_path.join(format!("stock_data_v{method}.parquet"))
    }
}

/// `[features]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct FeaturesConfig {
    /// Labeling threads; unset uses one per core
    pub(crate) workers: Option<usize>,
}

/// `[logging]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    pub(crate) level: String,
    pub(crate) format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load `path`, or `cairns.toml` if present, or the defaults.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        Ok(config.with_token_override(std::env::var(TOKEN_ENV).ok()))
    }

    pub(crate) fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace the configured token when `token` is set and non-empty.
    pub(crate) fn with_token_override(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.tushare.token = Some(token);
        }
        self
    }
}

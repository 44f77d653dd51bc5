//! Location and lifecycle of the SQLite record store.

use crate::config::StoreConfig;
use cairns_data::{DataError, SqliteStore};
use std::path::PathBuf;
use tracing::debug;

/// Get the default store directory.
///
/// Uses platform-specific data directories:
/// - Linux: `~/.local/share/cairns/`
/// - macOS: `~/Library/Application Support/cairns/`
/// - Windows: `%APPDATA%\cairns\`
pub(crate) fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cairns")
}

/// Get the default store database path.
pub(crate) fn default_store_path() -> PathBuf {
    default_store_dir().join("cairns.db")
}

/// The configured store path, falling back to the default.
pub(crate) fn store_path(config: &StoreConfig) -> PathBuf {
    config.path.clone().unwrap_or_else(default_store_path)
}

/// Open the store, creating its directory and schema if needed.
pub(crate) fn open_store(config: &StoreConfig) -> Result<SqliteStore, DataError> {
    let path = store_path(config);

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    debug!(path = %path.display(), "opening store");
    SqliteStore::open(&path)
}

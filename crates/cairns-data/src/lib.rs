#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/cairns/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod export;
pub mod ingest;
pub mod records;
pub mod snapshot;
pub mod source;
pub mod store;

pub use error::{DataError, Result};
pub use export::{ExportedSnapshot, Exporter};
pub use ingest::{DailyUpdate, DownloadOptions, DownloadReport, Ingestor};
pub use records::{DailyBar, SecurityBasic};
pub use source::{MarketDataSource, TushareSource};
pub use store::{CodeFilter, SqliteStore};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

//! Batched export of stored daily bars to a Parquet snapshot.

use crate::error::{DataError, Result};
use crate::records::bars_to_frame;
use crate::snapshot::write_parquet;
use crate::store::{CodeFilter, SqliteStore};
use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Default number of rows per store read.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Rows read out of the store.
#[derive(Debug, Clone)]
pub struct ExportedSnapshot {
    /// The exported table, in `(ts_code, trade_date)` order
    pub frame: DataFrame,
    /// Number of matching rows in the store
    pub total: usize,
    /// Number of windows read
    pub batches: usize,
}

/// Streams the daily bar table out of the store in bounded windows.
#[derive(Debug)]
pub struct Exporter<'a> {
    store: &'a SqliteStore,
}

impl<'a> Exporter<'a> {
    /// Create an exporter over an open store.
    pub const fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Read every matching row, batch by batch, into one table.
    ///
    /// Returns `None` when nothing matches. Only one window of store rows is
    /// materialized at a time; the windows are appended in order.
    pub fn collect(
        &self,
        batch_size: usize,
        code_prefixes: &[String],
    ) -> Result<Option<ExportedSnapshot>> {
        if batch_size == 0 {
            return Err(DataError::InvalidBatchSize(batch_size));
        }

        let filter = CodeFilter::prefixes(code_prefixes.iter().cloned());
        let total = self.store.count_daily_bars(&filter)?;
        info!(total, prefixes = ?code_prefixes, "matching daily bars");

        if total == 0 {
            return Ok(None);
        }

        let mut frame: Option<DataFrame> = None;
        let mut batches = 0;

        for offset in (0..total).step_by(batch_size) {
            debug!(
                from = offset + 1,
                to = (offset + batch_size).min(total),
                "fetching window"
            );
            let bars = self.store.daily_bar_window(&filter, batch_size, offset)?;
            let batch = bars_to_frame(&bars)?;
            batches += 1;

            match frame.as_mut() {
                Some(df) => {
                    df.vstack_mut(&batch)?;
                }
                None => frame = Some(batch),
            }
        }

        Ok(Some(ExportedSnapshot {
            frame: frame.unwrap_or_default(),
            total,
            batches,
        }))
    }

    /// Export matching rows to a Parquet file.
    ///
    /// No file is written when nothing matches.
    pub fn export(
        &self,
        output: &Path,
        batch_size: usize,
        code_prefixes: &[String],
    ) -> Result<Option<ExportedSnapshot>> {
        let Some(mut snapshot) = self.collect(batch_size, code_prefixes)? else {
            info!("no daily bars match, nothing exported");
            return Ok(None);
        };

        write_parquet(output, &mut snapshot.frame)?;
        info!(
            rows = snapshot.frame.height(),
            total = snapshot.total,
            path = %output.display(),
            "exported daily bars"
        );
        Ok(Some(snapshot))
    }
}

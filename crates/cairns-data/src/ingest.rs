//! Resumable ingestion of provider data into the record store.
//!
//! Every unit of work (one security's history, one trading day, the reference
//! table) is fetched and then upserted in a single store transaction. Because
//! writes are keyed upserts and the per-code skip check reads the store, any
//! loop can be stopped between items and restarted without duplicating rows.

use crate::error::{DataError, Result};
use crate::records::format_trade_date;
use crate::source::MarketDataSource;
use crate::store::SqliteStore;
use chrono::{Local, NaiveDate};
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

/// Options for [`Ingestor::download_stocks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// First trade date to request (default: 2016-01-01)
    pub start_date: NaiveDate,
    /// Last trade date to request, `None` for today
    pub end_date: Option<NaiveDate>,
    /// Skip codes that already have at least one stored bar (default: true)
    pub skip_existing: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap_or_default(),
            end_date: None,
            skip_existing: true,
        }
    }
}

/// Outcome of a batch download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Codes fetched and written
    pub downloaded: usize,
    /// Codes skipped because they were already stored
    pub skipped: usize,
    /// Codes whose fetch failed, with the reason
    pub failed: Vec<(String, String)>,
    /// Bar rows written
    pub rows: usize,
}

/// Outcome of a single-day update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyUpdate {
    /// The provider returned no rows, usually a non-trading day
    NoTradingData,
    /// Rows written for the day
    Updated {
        /// Number of bars written
        rows: usize,
    },
}

/// Downloads provider data into the store.
///
/// Provider failures while fetching a single item are logged and isolated to
/// that item; store failures abort the operation.
#[derive(Debug)]
pub struct Ingestor<'a, S> {
    store: &'a SqliteStore,
    source: &'a S,
    progress: Option<ProgressBar>,
}

impl<'a, S: MarketDataSource> Ingestor<'a, S> {
    /// Create an ingestor over an open store and a data source.
    pub const fn new(store: &'a SqliteStore, source: &'a S) -> Self {
        Self {
            store,
            source,
            progress: None,
        }
    }

    /// Report per-code progress of [`Self::download_stocks`] on a progress bar.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Refresh the security reference table.
    ///
    /// Fails with [`DataError::MissingData`] if the provider returns nothing.
    pub async fn update_security_basic(&self) -> Result<usize> {
        info!("fetching security reference table");
        let securities = self.source.security_basics().await?;

        if securities.is_empty() {
            return Err(DataError::MissingData {
                symbol: "stock_basic".to_string(),
                reason: "provider returned no securities".to_string(),
            });
        }

        let rows = self.store.upsert_security_basics(&securities)?;
        info!(rows, "security reference table updated");
        Ok(rows)
    }

    /// Codes currently in the reference table.
    pub fn listed_codes(&self) -> Result<Vec<String>> {
        self.store.security_codes()
    }

    /// Download the full history of each code, in order.
    ///
    /// Safe to re-run after an interruption: codes already stored are skipped
    /// when `skip_existing` is set, and re-fetched rows overwrite by key.
    pub async fn download_stocks(
        &self,
        codes: &[String],
        options: &DownloadOptions,
    ) -> Result<DownloadReport> {
        let start = format_trade_date(options.start_date);
        let end = format_trade_date(options.end_date.unwrap_or_else(today));
        let mut report = DownloadReport::default();

        if let Some(pb) = &self.progress {
            pb.set_length(codes.len() as u64);
        }

        for code in codes {
            if let Some(pb) = &self.progress {
                pb.set_message(code.clone());
                pb.inc(1);
            }

            if options.skip_existing && self.store.has_daily_bars(code)? {
                debug!(code = %code, "already stored, skipping");
                report.skipped += 1;
                continue;
            }

            let bars = match self.source.daily_bars(code, &start, &end).await {
                Ok(bars) => bars,
                Err(e) => {
                    warn!(code = %code, error = %e, "download failed");
                    report.failed.push((code.clone(), e.to_string()));
                    continue;
                }
            };

            report.rows += self.store.upsert_daily_bars(&bars)?;
            report.downloaded += 1;
            debug!(code = %code, rows = bars.len(), "downloaded");
        }

        if let Some(pb) = &self.progress {
            pb.finish_with_message(format!(
                "{} downloaded, {} skipped, {} failed",
                report.downloaded,
                report.skipped,
                report.failed.len()
            ));
        }

        info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed.len(),
            rows = report.rows,
            "download finished"
        );
        Ok(report)
    }

    /// Fetch every security's bar for one date (default today) and upsert it.
    pub async fn update_daily_data(&self, trade_date: Option<NaiveDate>) -> Result<DailyUpdate> {
        let date = format_trade_date(trade_date.unwrap_or_else(today));
        info!(trade_date = %date, "fetching daily cross-section");

        let bars = self.source.daily_cross_section(&date).await?;
        if bars.is_empty() {
            info!(trade_date = %date, "no trading data");
            return Ok(DailyUpdate::NoTradingData);
        }

        let rows = self.store.upsert_daily_bars(&bars)?;
        info!(trade_date = %date, rows, "daily data updated");
        Ok(DailyUpdate::Updated { rows })
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

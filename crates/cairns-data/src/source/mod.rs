//! Remote market data providers.
//!
//! Ingestion only depends on [`MarketDataSource`]; [`TushareSource`] is the
//! production implementation. All dates crossing this boundary are `YYYYMMDD`
//! strings.

pub mod tushare;

pub use tushare::TushareSource;

use crate::error::Result;
use crate::records::{DailyBar, SecurityBasic};
use std::future::Future;

/// A provider of daily bars and security reference data.
pub trait MarketDataSource {
    /// Full daily history of one security between two dates, inclusive.
    fn daily_bars(
        &self,
        ts_code: &str,
        start_date: &str,
        end_date: &str,
    ) -> impl Future<Output = Result<Vec<DailyBar>>> + Send;

    /// Bars of every security on one trading day.
    ///
    /// An empty result means the date was not a trading day.
    fn daily_cross_section(
        &self,
        trade_date: &str,
    ) -> impl Future<Output = Result<Vec<DailyBar>>> + Send;

    /// Reference table of tradable securities.
    fn security_basics(&self) -> impl Future<Output = Result<Vec<SecurityBasic>>> + Send;
}

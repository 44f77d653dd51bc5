//! Daily bar and reference records exchanged with the provider and the store.

use crate::error::{DataError, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Wire and storage format of trade dates.
pub const TRADE_DATE_FORMAT: &str = "%Y%m%d";

/// Days between 0001-01-01 (CE) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Column order of the `stock_daily` table and of exported snapshots.
pub const DAILY_BAR_COLUMNS: [&str; 11] = [
    "ts_code",
    "trade_date",
    "open",
    "high",
    "low",
    "close",
    "pre_close",
    "change",
    "pct_chg",
    "vol",
    "amount",
];

/// One trading day of one security.
///
/// `(ts_code, trade_date)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Exchange-suffixed security code, e.g. `000001.SZ`
    pub ts_code: String,
    /// Trade date as `YYYYMMDD`
    pub trade_date: String,
    /// Opening price
    pub open: Option<f64>,
    /// Highest price
    pub high: Option<f64>,
    /// Lowest price
    pub low: Option<f64>,
    /// Closing price
    pub close: Option<f64>,
    /// Previous close
    pub pre_close: Option<f64>,
    /// Absolute price change
    pub change: Option<f64>,
    /// Percent price change
    pub pct_chg: Option<f64>,
    /// Volume (lots)
    pub vol: Option<f64>,
    /// Turnover amount
    pub amount: Option<f64>,
}

impl DailyBar {
    /// Create a bar with only the key set.
    pub fn new(ts_code: impl Into<String>, trade_date: impl Into<String>) -> Self {
        Self {
            ts_code: ts_code.into(),
            trade_date: trade_date.into(),
            open: None,
            high: None,
            low: None,
            close: None,
            pre_close: None,
            change: None,
            pct_chg: None,
            vol: None,
            amount: None,
        }
    }
}

/// Reference data for one tradable security.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityBasic {
    /// Exchange-suffixed security code
    pub ts_code: String,
    /// Bare symbol, e.g. `000001`
    pub symbol: String,
    /// Short name
    pub name: String,
    /// Registered area
    pub area: Option<String>,
    /// Industry classification
    pub industry: Option<String>,
    /// Pinyin abbreviation of the name
    pub cnspell: Option<String>,
    /// Board the security trades on
    pub market: Option<String>,
    /// Listing date as `YYYYMMDD`
    pub list_date: Option<String>,
    /// Actual controller name
    pub act_name: String,
    /// Actual controller entity type
    pub act_ent_type: String,
}

/// Format a date the way the provider and the store expect it.
pub fn format_trade_date(date: NaiveDate) -> String {
    date.format(TRADE_DATE_FORMAT).to_string()
}

/// Parse a `YYYYMMDD` trade date.
pub fn parse_trade_date(value: &str) -> Result<NaiveDate> {
    if value.len() != 8 {
        return Err(DataError::InvalidDate(value.to_string()));
    }
    NaiveDate::parse_from_str(value, TRADE_DATE_FORMAT)
        .map_err(|_| DataError::InvalidDate(value.to_string()))
}

/// Days since the Unix epoch, the physical representation of a polars `Date`.
pub fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Build a DataFrame from bars, converting `trade_date` into a polars `Date`.
///
/// Columns follow [`DAILY_BAR_COLUMNS`].
pub fn bars_to_frame(bars: &[DailyBar]) -> Result<DataFrame> {
    let codes: Vec<&str> = bars.iter().map(|b| b.ts_code.as_str()).collect();
    let days = bars
        .iter()
        .map(|b| parse_trade_date(&b.trade_date).map(epoch_days))
        .collect::<Result<Vec<i32>>>()?;

    let [code_column, date_column, numeric_columns @ ..] = DAILY_BAR_COLUMNS;
    let numeric: [fn(&DailyBar) -> Option<f64>; 9] = [
        |b| b.open,
        |b| b.high,
        |b| b.low,
        |b| b.close,
        |b| b.pre_close,
        |b| b.change,
        |b| b.pct_chg,
        |b| b.vol,
        |b| b.amount,
    ];

    let mut columns: Vec<Column> = vec![
        Series::new(code_column.into(), codes).into(),
        Series::new(date_column.into(), days)
            .cast(&DataType::Date)?
            .into(),
    ];
    for (name, value) in numeric_columns.into_iter().zip(numeric) {
        columns.push(Series::new(name.into(), bars.iter().map(value).collect::<Vec<_>>()).into());
    }

    Ok(DataFrame::new(columns)?)
}

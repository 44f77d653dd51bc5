//! Basic cleaning of raw daily bars into the feature table layout.
//!
//! The cleaner coerces numeric columns to `f64`, turns exchange-suffixed codes
//! such as `000001.SZ` into integer ids, normalizes trade dates to integer
//! `YYYYMMDD` days and sorts rows by `(code, day)`. Every later shift or
//! rolling computation depends on that ordering.
//!
//! It then appends the forward return label:
//!
//! ```text
//! Ret_t11 = open[t + 11] / open[t + 1] - 1
//! ```
//!
//! computed within each security. The last rows of every security have no
//! forward target and keep a missing label.

use crate::error::{FeatureError, Result};
use crate::schema::{CODE, DAY, NUMERIC_COLUMNS, RET_T11, SECURITY_ID, TIME, require_columns};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

const STAGE: &str = "basic cleaning";

/// Days between 0001-01-01 (CE) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Configuration of the forward return label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardReturnConfig {
    /// Trading days until entry at the open (default: 1)
    pub entry_lag: usize,
    /// Trading days until exit at the open (default: 11)
    pub exit_lag: usize,
    /// Output column name (default: `Ret_t11`)
    pub name: String,
}

impl Default for ForwardReturnConfig {
    fn default() -> Self {
        Self {
            entry_lag: 1,
            exit_lag: 11,
            name: RET_T11.to_string(),
        }
    }
}

/// Normalizes raw bars into the canonical feature table.
#[derive(Debug, Default)]
pub struct BasicCleaner {
    forward: ForwardReturnConfig,
}

impl BasicCleaner {
    /// Create a cleaner with a custom forward return label.
    pub const fn with_config(forward: ForwardReturnConfig) -> Self {
        Self { forward }
    }

    /// Clean raw bars with `ts_code` and `trade_date` columns.
    ///
    /// Output columns: `code`, `day`, the numeric bar columns as `f64`,
    /// `SecurityID`, `time` and the forward return label.
    pub fn clean(&self, raw: DataFrame) -> Result<DataFrame> {
        require_columns(&raw, STAGE, &["ts_code", "trade_date", "open"])?;

        // Step 1: Coerce price and volume columns to f64
        let casts: Vec<Expr> = NUMERIC_COLUMNS
            .iter()
            .filter(|name| raw.column(name).is_ok())
            .map(|name| col(*name).cast(DataType::Float64))
            .collect();

        // Step 2: Integer ids and YYYYMMDD days under their new names,
        // keeping column positions
        let mut codes = parse_codes(raw.column("ts_code")?)?;
        let mut days = normalize_days(raw.column("trade_date")?)?;
        let mut columns: Vec<Column> = Vec::with_capacity(raw.width());
        for column in raw.take_columns() {
            match column.name().as_str() {
                "ts_code" => {
                    columns.push(Series::new(CODE.into(), std::mem::take(&mut codes)).into());
                }
                "trade_date" => {
                    columns.push(Series::new(DAY.into(), std::mem::take(&mut days)).into());
                }
                _ => columns.push(column),
            }
        }
        let df = DataFrame::new(columns)?;

        // Step 3: Derived id columns, then per-security chronological order
        let df = df
            .lazy()
            .with_columns(casts)
            .with_columns([col(CODE).alias(SECURITY_ID), col(DAY).alias(TIME)])
            .sort([CODE, DAY], Default::default())
            .collect()?;

        let df = self.add_forward_return(df)?;
        info!(rows = df.height(), "basic cleaning finished");
        Ok(df)
    }

    /// Append the forward open-to-open return label.
    ///
    /// Runs on an already cleaned table; rows are re-sorted by `(code, day)`.
    pub fn add_forward_return(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, STAGE, &[CODE, DAY, "open"])?;
        let entry = -(self.forward.entry_lag as i64);
        let exit = -(self.forward.exit_lag as i64);

        let df = df
            .lazy()
            .sort([CODE, DAY], Default::default())
            .with_column(
                (col("open").shift(lit(exit)).over([col(CODE)])
                    / col("open").shift(lit(entry)).over([col(CODE)])
                    - lit(1.0))
                .alias(self.forward.name.as_str()),
            )
            .collect()?;

        Ok(df)
    }
}

/// Parse `000001.SZ` style codes into their numeric id.
fn parse_code(ts_code: &str) -> Option<i64> {
    ts_code.split('.').next()?.trim().parse().ok()
}

fn parse_codes(column: &Column) -> Result<Vec<i64>> {
    let column = column.cast(&DataType::String)?;
    column
        .str()?
        .into_iter()
        .map(|code| {
            let code = code.ok_or_else(|| FeatureError::InvalidCode("null".to_string()))?;
            parse_code(code).ok_or_else(|| FeatureError::InvalidCode(code.to_string()))
        })
        .collect()
}

fn yyyymmdd(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day())
}

fn validate_day(value: i64) -> Result<i64> {
    let year = i32::try_from(value / 10_000).ok();
    let month = u32::try_from(value / 100 % 100).ok();
    let day = u32::try_from(value % 100).ok();

    match (year, month, day) {
        (Some(y), Some(m), Some(d)) if (1000..=9999).contains(&y) => NaiveDate::from_ymd_opt(y, m, d)
            .map(yyyymmdd)
            .ok_or_else(|| FeatureError::InvalidDay(value.to_string())),
        _ => Err(FeatureError::InvalidDay(value.to_string())),
    }
}

fn parse_day(value: &str) -> Result<i64> {
    let digits: String = value.trim().chars().filter(|c| *c != '-').collect();
    if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(FeatureError::InvalidDay(value.to_string()));
    }
    let parsed = digits
        .parse()
        .map_err(|_| FeatureError::InvalidDay(value.to_string()))?;
    validate_day(parsed)
}

/// Convert a trade date column of any supported type into `YYYYMMDD` integers.
fn normalize_days(column: &Column) -> Result<Vec<i64>> {
    let missing = || FeatureError::InvalidDay("null".to_string());

    match column.dtype() {
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            days.i32()?
                .into_iter()
                .map(|d| {
                    let d = d.ok_or_else(missing)?;
                    NaiveDate::from_num_days_from_ce_opt(d + UNIX_EPOCH_DAYS_FROM_CE)
                        .map(yyyymmdd)
                        .ok_or_else(|| FeatureError::InvalidDay(d.to_string()))
                })
                .collect()
        }
        DataType::Datetime(_, _) => normalize_days(&column.cast(&DataType::Date)?),
        DataType::String => column
            .str()?
            .into_iter()
            .map(|d| parse_day(d.ok_or_else(missing)?))
            .collect(),
        DataType::Int32 | DataType::Int64 | DataType::UInt32 | DataType::UInt64 => {
            let days = column.cast(&DataType::Int64)?;
            days.i64()?
                .into_iter()
                .map(|d| validate_day(d.ok_or_else(missing)?))
                .collect()
        }
        other => Err(FeatureError::InvalidDay(format!("unsupported dtype {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn raw_frame(codes: &[&str], days: &[&str], opens: &[f64]) -> DataFrame {
        DataFrame::new(vec![
            Series::new("ts_code".into(), codes.to_vec()).into(),
            Series::new("trade_date".into(), days.to_vec()).into(),
            Series::new("open".into(), opens.to_vec()).into(),
            Series::new("close".into(), opens.to_vec()).into(),
            Series::new("vol".into(), vec![100i64; codes.len()]).into(),
        ])
        .unwrap()
    }

    #[rstest]
    #[case("000001.SZ", Some(1))]
    #[case("600000.SH", Some(600_000))]
    #[case("830799.BJ", Some(830_799))]
    #[case("300750", Some(300_750))]
    #[case("ABC.SZ", None)]
    fn test_parse_code(#[case] input: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_code(input), expected);
    }

    #[rstest]
    #[case("20240102", 20_240_102)]
    #[case("2024-01-02", 20_240_102)]
    fn test_parse_day(#[case] input: &str, #[case] expected: i64) {
        assert_eq!(parse_day(input).unwrap(), expected);
    }

    #[rstest]
    #[case("2024010")]
    #[case("20241301")]
    #[case("2024/01/02")]
    fn test_parse_day_rejects(#[case] input: &str) {
        assert!(matches!(parse_day(input), Err(FeatureError::InvalidDay(_))));
    }

    #[test]
    fn test_normalize_date_column() {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let epoch = base.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE;
        let column: Column = Series::new("trade_date".into(), vec![epoch, epoch + 1])
            .cast(&DataType::Date)
            .unwrap()
            .into();

        assert_eq!(
            normalize_days(&column).unwrap(),
            vec![20_240_102, 20_240_103]
        );
    }

    #[test]
    fn test_normalize_integer_column() {
        let column: Column = Series::new("trade_date".into(), vec![20_240_102i64]).into();
        assert_eq!(normalize_days(&column).unwrap(), vec![20_240_102]);
    }

    #[test]
    fn test_clean_renames_sorts_and_adds_ids() {
        let raw = raw_frame(
            &["600000.SH", "000001.SZ", "000001.SZ"],
            &["20240102", "20240103", "20240102"],
            &[7.0, 9.4, 9.3],
        );

        let df = BasicCleaner::default().clean(raw).unwrap();

        let codes: Vec<Option<i64>> = df.column(CODE).unwrap().i64().unwrap().into_iter().collect();
        let days: Vec<Option<i64>> = df.column(DAY).unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(codes, vec![Some(1), Some(1), Some(600_000)]);
        assert_eq!(days, vec![Some(20_240_102), Some(20_240_103), Some(20_240_102)]);

        let ids: Vec<Option<i64>> = df.column(SECURITY_ID).unwrap().i64().unwrap().into_iter().collect();
        let times: Vec<Option<i64>> = df.column(TIME).unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(ids, codes);
        assert_eq!(times, days);
        assert_eq!(df.column("vol").unwrap().dtype(), &DataType::Float64);
        assert!(df.column("ts_code").is_err());
        assert!(df.column("trade_date").is_err());
    }

    #[test]
    fn test_clean_minimal_bars() {
        let raw = DataFrame::new(vec![
            Series::new("ts_code".into(), vec!["000001.SZ", "000001.SZ"]).into(),
            Series::new("trade_date".into(), vec!["20240102", "20240103"]).into(),
            Series::new("open".into(), vec![9.3, 9.4]).into(),
        ])
        .unwrap();

        let df = BasicCleaner::default().clean(raw).unwrap();

        assert_eq!(
            df.get_column_names_str(),
            vec![CODE, DAY, "open", SECURITY_ID, TIME, RET_T11]
        );
        assert_eq!(df.height(), 2);
        assert_eq!(df.column(CODE).unwrap().i64().unwrap().get(1), Some(1));
        assert_eq!(df.column(DAY).unwrap().i64().unwrap().get(1), Some(20_240_103));
    }

    #[test]
    fn test_forward_return_label() {
        let days: Vec<String> = (1..=13).map(|d| format!("202401{d:02}")).collect();
        let days: Vec<&str> = days.iter().map(String::as_str).collect();
        let opens: Vec<f64> = (1..=13).map(f64::from).collect();
        let codes = vec!["000001.SZ"; 13];

        let df = BasicCleaner::default()
            .clean(raw_frame(&codes, &days, &opens))
            .unwrap();
        let label = df.column(RET_T11).unwrap().f64().unwrap();

        // open[t + 11] / open[t + 1] - 1
        assert_relative_eq!(label.get(0).unwrap(), 12.0 / 2.0 - 1.0);
        assert_relative_eq!(label.get(1).unwrap(), 13.0 / 3.0 - 1.0);
        // Trailing rows have no exit open
        assert_eq!(label.null_count(), 11);
        assert!(label.get(2).is_none());
        assert!(label.get(12).is_none());
    }

    #[test]
    fn test_forward_return_does_not_cross_securities() {
        let mut codes = vec!["000001.SZ"; 12];
        codes.extend(vec!["000002.SZ"; 12]);
        let days: Vec<String> = (1..=12).map(|d| format!("202401{d:02}")).collect();
        let days: Vec<&str> = days.iter().chain(days.iter()).map(String::as_str).collect();
        let opens: Vec<f64> = (1..=24).map(f64::from).collect();

        let df = BasicCleaner::default()
            .clean(raw_frame(&codes, &days, &opens))
            .unwrap();
        let label = df.column(RET_T11).unwrap().f64().unwrap();

        assert_relative_eq!(label.get(0).unwrap(), 12.0 / 2.0 - 1.0);
        assert!(label.get(1).is_none());
        assert_relative_eq!(label.get(12).unwrap(), 24.0 / 14.0 - 1.0);
        assert_eq!(label.null_count(), 22);
    }

    #[test]
    fn test_custom_forward_return() {
        let cleaner = BasicCleaner::with_config(ForwardReturnConfig {
            entry_lag: 1,
            exit_lag: 2,
            name: "Ret_t2".to_string(),
        });
        let df = cleaner
            .clean(raw_frame(
                &["000001.SZ"; 3],
                &["20240102", "20240103", "20240104"],
                &[1.0, 2.0, 4.0],
            ))
            .unwrap();

        let label = df.column("Ret_t2").unwrap().f64().unwrap();
        assert_relative_eq!(label.get(0).unwrap(), 1.0);
        assert!(label.get(1).is_none());
    }

    #[test]
    fn test_invalid_code_fails() {
        let raw = raw_frame(&["INDEX.SH"], &["20240102"], &[1.0]);
        let result = BasicCleaner::default().clean(raw);
        assert!(matches!(result, Err(FeatureError::InvalidCode(code)) if code == "INDEX.SH"));
    }

    #[test]
    fn test_missing_open_fails() {
        let raw = DataFrame::new(vec![
            Series::new("ts_code".into(), vec!["000001.SZ"]).into(),
            Series::new("trade_date".into(), vec!["20240102"]).into(),
        ])
        .unwrap();

        let result = BasicCleaner::default().clean(raw);
        assert!(matches!(result, Err(FeatureError::MissingColumn { column, .. }) if column == "open"));
    }
}

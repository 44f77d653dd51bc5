//! Column names of the feature table.

use crate::error::{FeatureError, Result};
use polars::prelude::*;

/// Integer security id.
pub const CODE: &str = "code";
/// Trade day as an integer `YYYYMMDD`.
pub const DAY: &str = "day";
/// Intraday timestamp slot, equal to [`DAY`] for daily data.
pub const TIME: &str = "time";
/// Security id expected by downstream models.
pub const SECURITY_ID: &str = "SecurityID";
/// Forward open-to-open return label.
pub const RET_T11: &str = "Ret_t11";

/// Raw bar columns coerced to `f64` by the cleaner.
pub const NUMERIC_COLUMNS: [&str; 9] = [
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

/// Name of the raw-value label column derived from `target`.
pub fn std_column(target: &str) -> String {
    format!("{target}_std")
}

/// Name of the rank label column derived from `target`.
pub fn rank_std_column(target: &str) -> String {
    format!("{target}_rank_std")
}

/// Fail with [`FeatureError::MissingColumn`] unless every column is present.
pub fn require_columns<S: AsRef<str>>(
    df: &DataFrame,
    stage: &'static str,
    columns: &[S],
) -> Result<()> {
    for column in columns {
        let column = column.as_ref();
        if df.column(column).is_err() {
            return Err(FeatureError::MissingColumn {
                stage,
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Non-null `i64` values of a key column.
pub(crate) fn key_values(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let column = df.column(name)?.cast(&DataType::Int64)?;
    column
        .i64()?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                let reason = format!("null value in key column '{name}'");
                if name == CODE {
                    FeatureError::InvalidCode(reason)
                } else {
                    FeatureError::InvalidDay(reason)
                }
            })
        })
        .collect()
}

/// `f64` values of a column, with NaN read as missing.
pub(crate) fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_columns_names_missing_column() {
        let df = DataFrame::new(vec![Series::new(CODE.into(), vec![1i64]).into()]).unwrap();

        assert!(require_columns(&df, "test", &[CODE]).is_ok());
        let err = require_columns(&df, "test", &[CODE, DAY]).unwrap_err();
        assert!(matches!(err, FeatureError::MissingColumn { ref column, .. } if column == DAY));
        assert_eq!(err.to_string(), "test: required column 'day' is missing");
    }

    #[test]
    fn test_float_values_treat_nan_as_missing() {
        let df = DataFrame::new(vec![
            Series::new("x".into(), vec![Some(1.0), None, Some(f64::NAN)]).into(),
        ])
        .unwrap();

        assert_eq!(float_values(&df, "x").unwrap(), vec![Some(1.0), None, None]);
    }

    #[test]
    fn test_label_column_names() {
        assert_eq!(std_column(RET_T11), "Ret_t11_std");
        assert_eq!(rank_std_column(RET_T11), "Ret_t11_rank_std");
    }
}

//! Rolling technical features.
//!
//! Adds price range, ratio and rolling mean columns to a cleaned table. Rolling
//! and lagged columns are computed within each security after sorting by
//! `(code, day)`.

use crate::error::Result;
use crate::schema::{CODE, DAY, require_columns};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

const STAGE: &str = "technical features";

/// Columns read by [`TechnicalFeatures`].
pub const TECHNICAL_INPUTS: [&str; 9] = [
    CODE,
    DAY,
    "open",
    "high",
    "low",
    "close",
    "pre_close",
    "vol",
    "amount",
];

/// Configuration for the technical feature set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalConfig {
    /// Short rolling window in trading days (default: 5)
    pub short_window: usize,
    /// Long rolling window in trading days (default: 10)
    pub long_window: usize,
    /// Lag of the momentum ratio in trading days (default: 5)
    pub momentum_lag: usize,
    /// Added to volume before dividing (default: 1e-6)
    pub epsilon: f64,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 10,
            momentum_lag: 5,
            epsilon: 1e-6,
        }
    }
}

/// Computes the technical feature columns.
#[derive(Debug, Default)]
pub struct TechnicalFeatures {
    config: TechnicalConfig,
}

impl TechnicalFeatures {
    /// Create the feature set with a custom configuration.
    pub const fn with_config(config: TechnicalConfig) -> Self {
        Self { config }
    }

    /// Append the technical columns to `df`.
    pub fn transform(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, STAGE, &TECHNICAL_INPUTS)?;
        let TechnicalConfig {
            short_window,
            long_window,
            momentum_lag,
            epsilon,
        } = self.config;

        let df = df
            .lazy()
            .sort([CODE, DAY], Default::default())
            .with_columns([
                (col("high") - col("low")).alias("price_diff"),
                (col("close") / col("open")).alias("close_open_ratio"),
                ((col("high") - col("low")) / col("pre_close")).alias("volatility"),
                (col("amount") / (col("vol") + lit(epsilon))).alias("amount_per_vol"),
                rolling_mean("vol", short_window),
                rolling_mean("vol", long_window),
                rolling_mean("close", short_window),
                rolling_mean("close", long_window),
                (col("close") / col("close").shift(lit(momentum_lag as i64)).over([col(CODE)])
                    - lit(1.0))
                .fill_nan(lit(0.0))
                .fill_null(lit(0.0))
                .alias("momentum"),
            ])
            .collect()?;

        Ok(df)
    }
}

/// Per-security trailing mean named `<column>_ma<window>`.
fn rolling_mean(column: &str, window: usize) -> Expr {
    col(column)
        .rolling_mean(RollingOptionsFixedWindow {
            window_size: window,
            min_periods: 1,
            ..Default::default()
        })
        .over([col(CODE)])
        .alias(format!("{column}_ma{window}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeatureError;
    use approx::assert_relative_eq;

    fn bars(codes: &[i64], closes: &[f64]) -> DataFrame {
        let n = codes.len();
        let mut days = Vec::with_capacity(n);
        let mut day = 0;
        for (i, code) in codes.iter().enumerate() {
            if i > 0 && codes[i - 1] != *code {
                day = 0;
            }
            days.push(20_240_101 + day);
            day += 1;
        }

        DataFrame::new(vec![
            Series::new(CODE.into(), codes.to_vec()).into(),
            Series::new(DAY.into(), days).into(),
            Series::new("open".into(), closes.to_vec()).into(),
            Series::new("high".into(), closes.iter().map(|c| c + 1.0).collect::<Vec<_>>()).into(),
            Series::new("low".into(), closes.iter().map(|c| c - 1.0).collect::<Vec<_>>()).into(),
            Series::new("close".into(), closes.to_vec()).into(),
            Series::new("pre_close".into(), vec![2.0; n]).into(),
            Series::new("vol".into(), (1..=n).map(|v| v as f64).collect::<Vec<_>>()).into(),
            Series::new("amount".into(), vec![10.0; n]).into(),
        ])
        .unwrap()
    }

    fn values(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn test_momentum_fills_leading_rows_with_zero() {
        let df = bars(&[1; 6], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let out = TechnicalFeatures::default().transform(df).unwrap();

        let momentum = values(&out, "momentum");
        assert_eq!(&momentum[..5], &[0.0; 5]);
        assert_relative_eq!(momentum[5], 5.0);
    }

    #[test]
    fn test_rolling_means_use_partial_windows() {
        let df = bars(&[1; 6], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let out = TechnicalFeatures::default().transform(df).unwrap();

        let vol_ma5 = values(&out, "vol_ma5");
        assert_relative_eq!(vol_ma5[0], 1.0);
        assert_relative_eq!(vol_ma5[1], 1.5);
        assert_relative_eq!(vol_ma5[5], 4.0);

        let close_ma10 = values(&out, "close_ma10");
        assert_relative_eq!(close_ma10[5], 3.5);
    }

    #[test]
    fn test_rolling_windows_restart_per_security() {
        let df = bars(&[1, 1, 1, 2, 2], &[1.0, 2.0, 3.0, 10.0, 20.0]);
        let out = TechnicalFeatures::default().transform(df).unwrap();

        let close_ma5 = values(&out, "close_ma5");
        assert_relative_eq!(close_ma5[3], 10.0);
        assert_relative_eq!(close_ma5[4], 15.0);
        assert_eq!(values(&out, "momentum")[4], 0.0);
    }

    #[test]
    fn test_row_features() {
        let df = bars(&[1; 2], &[4.0, 8.0]);
        let out = TechnicalFeatures::default().transform(df).unwrap();

        assert_eq!(values(&out, "price_diff"), vec![2.0, 2.0]);
        assert_eq!(values(&out, "close_open_ratio"), vec![1.0, 1.0]);
        assert_eq!(values(&out, "volatility"), vec![1.0, 1.0]);
        assert_relative_eq!(values(&out, "amount_per_vol")[1], 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_missing_input_column_fails() {
        let df = bars(&[1; 2], &[4.0, 8.0]).drop("pre_close").unwrap();
        let result = TechnicalFeatures::default().transform(df);
        assert!(matches!(result, Err(FeatureError::MissingColumn { column, .. }) if column == "pre_close"));
    }
}

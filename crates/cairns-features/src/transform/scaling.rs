//! Global normalization fitted on a window of trading days.
//!
//! Scaling parameters are estimated only from rows with
//! `fit_start <= day <= fit_end` and then applied to the whole table, so a
//! window ending before the evaluation period keeps later data out of the fit.
//!
//! Two estimators are available:
//!
//! - [`ScalingMethod::Robust`]: center on the median, scale by the
//!   interquartile range (quartiles by linear interpolation)
//! - [`ScalingMethod::ZScore`]: center on the mean, scale by the population
//!   standard deviation
//!
//! Every column is transformed as `(x - center) / (scale + epsilon)`.

use crate::error::{FeatureError, Result};
use crate::schema::{
    CODE, DAY, RET_T11, SECURITY_ID, TIME, rank_std_column, require_columns, std_column,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

const STAGE: &str = "windowed scaling";

/// Estimator used to fit the scaling parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMethod {
    /// Median and interquartile range
    #[default]
    Robust,
    /// Mean and population standard deviation
    ZScore,
}

/// Configuration for windowed scaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// First day of the fit window, `YYYYMMDD`
    pub fit_start: i64,
    /// Last day of the fit window, `YYYYMMDD`
    pub fit_end: i64,
    /// Estimator (default: robust)
    pub method: ScalingMethod,
    /// Added to the scale before dividing (default: 1e-6)
    pub epsilon: f64,
}

impl ScalingConfig {
    /// Robust scaling fitted on `[fit_start, fit_end]`.
    pub const fn new(fit_start: i64, fit_end: i64) -> Self {
        Self {
            fit_start,
            fit_end,
            method: ScalingMethod::Robust,
            epsilon: 1e-6,
        }
    }
}

/// Center and scale of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleParams {
    /// Median or mean
    pub center: f64,
    /// Interquartile range or standard deviation
    pub scale: f64,
}

/// Fitted parameters for every scaled column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationFitParams {
    /// Estimator the parameters came from
    pub method: ScalingMethod,
    /// Parameters keyed by column name
    pub columns: BTreeMap<String, ScaleParams>,
}

/// Columns never scaled.
pub fn excluded_columns() -> Vec<String> {
    let mut columns: Vec<String> = [CODE, DAY, TIME, SECURITY_ID, RET_T11]
        .iter()
        .map(ToString::to_string)
        .collect();
    columns.push(std_column(RET_T11));
    columns.push(rank_std_column(RET_T11));
    columns
}

/// Fits and applies window-based normalization.
#[derive(Debug, Clone)]
pub struct WindowedScaling {
    config: ScalingConfig,
}

impl WindowedScaling {
    /// Create a scaler from its configuration.
    pub const fn new(config: ScalingConfig) -> Self {
        Self { config }
    }

    /// Access the configuration.
    pub const fn config(&self) -> &ScalingConfig {
        &self.config
    }

    /// Numeric columns of `df` that get scaled.
    pub fn feature_columns(df: &DataFrame) -> Vec<String> {
        let excluded = excluded_columns();
        df.get_columns()
            .iter()
            .filter(|c| is_numeric(c.dtype()))
            .map(|c| c.name().to_string())
            .filter(|name| !excluded.contains(name))
            .collect()
    }

    /// Estimate per-column parameters from the rows inside the fit window.
    pub fn fit(&self, df: &DataFrame) -> Result<NormalizationFitParams> {
        let ScalingConfig {
            fit_start,
            fit_end,
            method,
            ..
        } = self.config;
        if fit_start > fit_end {
            return Err(FeatureError::InvalidWindow {
                start: fit_start,
                end: fit_end,
            });
        }
        require_columns(df, STAGE, &[DAY])?;

        let names = Self::feature_columns(df);
        let mut exprs = vec![len().cast(DataType::Int64).alias("rows")];
        for name in &names {
            // NaN counts as missing, like a null
            let x = col(name.as_str())
                .cast(DataType::Float64)
                .fill_nan(lit(NULL));
            let (center, scale) = match method {
                ScalingMethod::Robust => (
                    x.clone().median(),
                    x.clone().quantile(lit(0.75), QuantileMethod::Linear)
                        - x.clone().quantile(lit(0.25), QuantileMethod::Linear),
                ),
                ScalingMethod::ZScore => (x.clone().mean(), x.clone().std(0)),
            };
            exprs.push(x.count().cast(DataType::Int64).alias(format!("count:{name}")));
            exprs.push(center.alias(format!("center:{name}")));
            exprs.push(scale.alias(format!("scale:{name}")));
        }

        let stats = df
            .clone()
            .lazy()
            .filter(col(DAY).gt_eq(lit(fit_start)).and(col(DAY).lt_eq(lit(fit_end))))
            .select(exprs)
            .collect()?;

        let sample_rows = count_at(&stats, "rows")?;
        if sample_rows == 0 {
            return Err(FeatureError::EmptyFitWindow {
                start: fit_start,
                end: fit_end,
            });
        }
        debug!(sample_rows, fit_start, fit_end, "fit window selected");

        let mut columns = BTreeMap::new();
        for name in names {
            if count_at(&stats, &format!("count:{name}"))? == 0 {
                return Err(FeatureError::UndefinedScale { column: name });
            }
            let center = value_at(&stats, &format!("center:{name}"))?;
            let scale = value_at(&stats, &format!("scale:{name}"))?;
            match (center, scale) {
                (Some(center), Some(scale)) => {
                    columns.insert(name, ScaleParams { center, scale });
                }
                _ => return Err(FeatureError::UndefinedScale { column: name }),
            }
        }

        info!(
            columns = columns.len(),
            sample_rows,
            method = ?method,
            "fitted normalization parameters"
        );
        Ok(NormalizationFitParams { method, columns })
    }

    /// Apply fitted parameters to every row of `df`.
    pub fn apply(&self, df: DataFrame, params: &NormalizationFitParams) -> Result<DataFrame> {
        let names: Vec<&str> = params.columns.keys().map(String::as_str).collect();
        require_columns(&df, STAGE, &names)?;

        let epsilon = self.config.epsilon;
        let exprs: Vec<Expr> = params
            .columns
            .iter()
            .map(|(name, p)| {
                ((col(name.as_str()).cast(DataType::Float64) - lit(p.center))
                    / lit(p.scale + epsilon))
                .alias(name.as_str())
            })
            .collect();

        Ok(df.lazy().with_columns(exprs).collect()?)
    }

    /// Fit on the window, then apply to the whole table.
    pub fn fit_transform(&self, df: DataFrame) -> Result<DataFrame> {
        let params = self.fit(&df)?;
        self.apply(df, &params)
    }
}

const fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

fn count_at(stats: &DataFrame, name: &str) -> Result<i64> {
    Ok(stats.column(name)?.i64()?.get(0).unwrap_or(0))
}

fn value_at(stats: &DataFrame, name: &str) -> Result<Option<f64>> {
    Ok(stats.column(name)?.cast(&DataType::Float64)?.f64()?.get(0))
}

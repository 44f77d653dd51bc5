//! Projection onto the fixed column layout consumed by downstream models.

use crate::error::Result;
use crate::schema::{CODE, DAY, RET_T11, SECURITY_ID, TIME, rank_std_column, require_columns, std_column};
use polars::prelude::*;

const STAGE: &str = "model schema";

/// Added to volume before computing `adjvwap`.
const VWAP_EPSILON: f64 = 1e-6;

/// Output columns of [`ModelSchema`], in order.
pub fn model_columns() -> Vec<String> {
    let mut columns: Vec<String> = [
        CODE,
        DAY,
        TIME,
        SECURITY_ID,
        "open",
        "high",
        "low",
        "close",
        "pre_close",
        "vol",
        "amount",
        "adjvwap",
        RET_T11,
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    columns.push(std_column(RET_T11));
    columns.push(rank_std_column(RET_T11));
    columns
}

/// Adds `adjvwap = amount / (vol + 1e-6)` and keeps only the model columns.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelSchema;

impl ModelSchema {
    /// Columns the input must provide.
    pub fn required_columns() -> Vec<String> {
        model_columns()
            .into_iter()
            .filter(|c| c != "adjvwap")
            .collect()
    }

    /// Project `df` onto the model layout.
    pub fn transform(&self, df: DataFrame) -> Result<DataFrame> {
        require_columns(&df, STAGE, &Self::required_columns())?;

        let df = df
            .lazy()
            .with_column(
                (col("amount") / (col("vol") + lit(VWAP_EPSILON))).alias("adjvwap"),
            )
            .select(model_columns().iter().map(|c| col(c.as_str())).collect::<Vec<_>>())
            .collect()?;

        Ok(df)
    }
}

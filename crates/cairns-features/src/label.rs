//! Cross-sectional labels computed independently for every trading day.
//!
//! For each target column two labels are added:
//!
//! - `<target>_std`: the raw value, standardized within the day
//! - `<target>_rank_std`: the ascending min-rank of the value within the day,
//!   standardized within the day
//!
//! Standardization is `(x - mean) / (std + epsilon)` with the population
//! standard deviation over the day's non-missing values. Missing values stay
//! missing. A day with one security, or with identical values, maps to 0.

use crate::error::{FeatureError, Result};
use crate::schema::{CODE, DAY, float_values, key_values, rank_std_column, require_columns, std_column};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

const STAGE: &str = "cross-sectional labeling";

/// Configuration for the cross-sectional labeler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelerConfig {
    /// Worker threads for the per-day computation (default: rayon's choice)
    pub workers: Option<usize>,
    /// Added to the standard deviation before dividing (default: 1e-6)
    pub epsilon: f64,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            workers: None,
            epsilon: 1e-6,
        }
    }
}

/// Adds per-day standardized value and rank labels.
#[derive(Debug, Default)]
pub struct CrossSectionalLabeler {
    config: LabelerConfig,
}

/// Labels of one day, aligned with `rows`.
struct DayLabels {
    rows: Vec<usize>,
    /// One `(std, rank_std)` pair per target column
    columns: Vec<(Vec<Option<f64>>, Vec<Option<f64>>)>,
}

impl CrossSectionalLabeler {
    /// Create a labeler with the given configuration.
    pub const fn with_config(config: LabelerConfig) -> Self {
        Self { config }
    }

    /// Access the configuration.
    pub const fn config(&self) -> &LabelerConfig {
        &self.config
    }

    /// Label `table` for every column in `targets`.
    ///
    /// The result holds every input row, sorted by `(code, day)`. Label
    /// columns already present are replaced.
    pub fn label(&self, table: DataFrame, targets: &[&str]) -> Result<DataFrame> {
        require_columns(&table, STAGE, &[CODE, DAY])?;
        require_columns(&table, STAGE, targets)?;

        let codes = key_values(&table, CODE)?;
        let days = key_values(&table, DAY)?;
        ensure_unique_keys(&codes, &days)?;

        let values = targets
            .iter()
            .map(|target| float_values(&table, target))
            .collect::<Result<Vec<_>>>()?;

        // Scatter: row indices grouped by day
        let mut by_day: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (row, day) in days.iter().enumerate() {
            by_day.entry(*day).or_default().push(row);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.unwrap_or(0))
            .build()?;
        let epsilon = self.config.epsilon;

        let labeled: Vec<DayLabels> = pool.install(|| {
            by_day
                .par_iter()
                .map(|(_, rows)| label_day(rows, &values, epsilon))
                .collect::<Result<Vec<_>>>()
        })?;
        debug!(
            days = labeled.len(),
            threads = pool.current_num_threads(),
            "labeled cross-sections"
        );

        // Gather: one label row per input row, keyed by (code, day)
        let order: Vec<usize> = labeled.iter().flat_map(|d| d.rows.iter().copied()).collect();
        let mut columns: Vec<Column> = vec![
            Series::new(CODE.into(), order.iter().map(|&r| codes[r]).collect::<Vec<_>>()).into(),
            Series::new(DAY.into(), order.iter().map(|&r| days[r]).collect::<Vec<_>>()).into(),
        ];
        for (index, target) in targets.iter().enumerate() {
            let std: Vec<Option<f64>> = labeled
                .iter()
                .flat_map(|d| d.columns[index].0.iter().copied())
                .collect();
            let rank: Vec<Option<f64>> = labeled
                .iter()
                .flat_map(|d| d.columns[index].1.iter().copied())
                .collect();
            columns.push(Series::new(std_column(target).into(), std).into());
            columns.push(Series::new(rank_std_column(target).into(), rank).into());
        }
        let labels = DataFrame::new(columns)?;

        let mut table = table;
        for target in targets {
            for name in [std_column(target), rank_std_column(target)] {
                if table.column(&name).is_ok() {
                    table.drop_in_place(&name)?;
                }
            }
        }

        let merged = table
            .lazy()
            .with_columns([
                col(CODE).cast(DataType::Int64),
                col(DAY).cast(DataType::Int64),
            ])
            .join(
                labels.lazy(),
                [col(CODE), col(DAY)],
                [col(CODE), col(DAY)],
                JoinArgs::new(JoinType::Left),
            )
            .sort([CODE, DAY], Default::default())
            .collect()?;

        info!(
            rows = merged.height(),
            days = by_day.len(),
            targets = ?targets,
            "cross-sectional labeling finished"
        );
        Ok(merged)
    }
}

fn ensure_unique_keys(codes: &[i64], days: &[i64]) -> Result<()> {
    let mut seen = HashSet::with_capacity(codes.len());
    for (&code, &day) in codes.iter().zip(days) {
        if !seen.insert((code, day)) {
            return Err(FeatureError::DuplicateKey { code, day });
        }
    }
    Ok(())
}

/// Standardized value and rank of every target within one day.
fn label_day(rows: &[usize], values: &[Vec<Option<f64>>], epsilon: f64) -> Result<DayLabels> {
    let mut inputs: Vec<Column> = Vec::with_capacity(values.len());
    let mut exprs = Vec::with_capacity(values.len() * 2);
    for (index, column) in values.iter().enumerate() {
        let name = format!("target:{index}");
        let day_values: Vec<Option<f64>> = rows.iter().map(|&r| column[r]).collect();
        inputs.push(Series::new(name.as_str().into(), day_values).into());

        let rank = col(name.as_str())
            .rank(
                RankOptions {
                    method: RankMethod::Min,
                    descending: false,
                },
                None,
            )
            .cast(DataType::Float64);
        exprs.push(standardize(col(name.as_str()), epsilon).alias(format!("std:{index}")));
        exprs.push(standardize(rank, epsilon).alias(format!("rank:{index}")));
    }

    let day = DataFrame::new(inputs)?.lazy().select(exprs).collect()?;
    let columns = (0..values.len())
        .map(|index| {
            Ok((
                label_values(&day, &format!("std:{index}"))?,
                label_values(&day, &format!("rank:{index}"))?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DayLabels {
        rows: rows.to_vec(),
        columns,
    })
}

/// `(x - mean) / (std + epsilon)` with the population standard deviation.
fn standardize(x: Expr, epsilon: f64) -> Expr {
    (x.clone() - x.clone().mean()) / (x.std(0) + lit(epsilon))
}

fn label_values(day: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(day.column(name)?.f64()?.into_iter().collect())
}

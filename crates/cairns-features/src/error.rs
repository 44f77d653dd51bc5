//! Error types for feature pipeline stages.

use thiserror::Error;

/// Result type for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Errors raised by the cleaning, labeling and transform stages.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// A stage needs a column the input does not have
    #[error("{stage}: required column '{column}' is missing")]
    MissingColumn {
        /// Stage that raised the error
        stage: &'static str,
        /// Name of the missing column
        column: String,
    },

    /// Security code that does not start with a numeric identifier
    #[error("Invalid security code: {0}")]
    InvalidCode(String),

    /// Trade date that cannot be read as YYYYMMDD
    #[error("Invalid trade day: {0}")]
    InvalidDay(String),

    /// More than one row for the same security and day
    #[error("Duplicate row for code {code} on day {day}")]
    DuplicateKey {
        /// Security id
        code: i64,
        /// Trade day
        day: i64,
    },

    /// The normalization fit window selected no rows
    #[error("Fit window [{start}, {end}] selects no rows")]
    EmptyFitWindow {
        /// First day of the window
        start: i64,
        /// Last day of the window
        end: i64,
    },

    /// The fit window is inverted
    #[error("Invalid fit window: start {start} is after end {end}")]
    InvalidWindow {
        /// First day of the window
        start: i64,
        /// Last day of the window
        end: i64,
    },

    /// Windowed scaling was requested without a fit window
    #[error("Windowed scaling needs a fit window")]
    MissingFitWindow,

    /// A feature column has no usable value inside the fit window
    #[error("Cannot fit scaling for '{column}': no values in the fit window")]
    UndefinedScale {
        /// Column that could not be fitted
        column: String,
    },

    /// Unknown transform method tag
    #[error("Unknown feature method: {0}")]
    UnknownMethod(u8),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

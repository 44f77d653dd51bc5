//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// The market data provider rejected or failed a request
    #[error("Provider error: {0}")]
    Provider(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Invalid trade date
    #[error("Invalid trade date '{0}', expected YYYYMMDD")]
    InvalidDate(String),

    /// Missing data
    #[error("Missing data for {symbol}: {reason}")]
    MissingData {
        /// Code or table that was queried
        symbol: String,
        /// Reason for missing data
        reason: String,
    },

    /// Export batch size must be positive
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(usize),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// Whether the error came from the record store.
    ///
    /// Store failures abort the current operation; everything raised while
    /// fetching a single item from the provider is isolated to that item.
    pub const fn is_store_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_classification() {
        let store = DataError::Database(rusqlite::Error::InvalidQuery);
        assert!(store.is_store_error());

        let provider = DataError::Provider("rate limited".to_string());
        assert!(!provider.is_store_error());
    }

    #[test]
    fn test_error_messages_name_the_condition() {
        let err = DataError::InvalidDate("2024-13".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid trade date '2024-13', expected YYYYMMDD"
        );
    }
}

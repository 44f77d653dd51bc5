//! Relational record store for daily bars and reference data.

pub mod sqlite;

pub use sqlite::{CodeFilter, SqliteStore, StoreStats};

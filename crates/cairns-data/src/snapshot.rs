//! Parquet snapshot files.

use crate::error::Result;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

/// Write a DataFrame to a Parquet file, creating parent directories.
pub fn write_parquet(path: &Path, df: &mut DataFrame) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    ParquetWriter::new(&mut file).finish(df)?;
    Ok(())
}

/// Read a Parquet file into a DataFrame.
pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)?;
    let df = ParquetReader::new(file).finish()?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parquet_round_trip_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.parquet");

        let mut df = DataFrame::new(vec![
            Series::new("code".into(), vec![1i64, 600_000]).into(),
            Series::new("close".into(), vec![Some(9.39), None]).into(),
        ])
        .unwrap();

        write_parquet(&path, &mut df).unwrap();
        let loaded = read_parquet(&path).unwrap();

        assert!(loaded.equals_missing(&df));
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_parquet(&dir.path().join("absent.parquet"));
        assert!(matches!(result, Err(crate::DataError::Io(_))));
    }
}

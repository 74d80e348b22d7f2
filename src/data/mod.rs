//! Tabular data loading
//!
//! Features and target come from separate CSV or Parquet files. Every column is cast to
//! `f64`; nulls or non-numeric values are data errors.

use crate::error::{AutoMlError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Supported table formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => Ok(TableFormat::Csv),
            Some("parquet") => Ok(TableFormat::Parquet),
            other => Err(AutoMlError::UnsupportedFormat(format!(
                "{} (extension {:?})",
                path.display(),
                other.unwrap_or("")
            ))),
        }
    }
}

/// Read a CSV or Parquet file into a frame
pub fn read_table(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(AutoMlError::FileNotFound(path.display().to_string()));
    }
    let format = TableFormat::from_path(path)?;
    let file = File::open(path)?;
    let df = match format {
        TableFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(file)
            .finish()?,
        TableFormat::Parquet => ParquetReader::new(file).finish()?,
    };
    tracing::debug!(path = %path.display(), rows = df.height(), cols = df.width(), "table loaded");
    Ok(df)
}

fn column_values(column: &Column) -> Result<Vec<f64>> {
    let cast = column
        .cast(&DataType::Float64)
        .map_err(|e| AutoMlError::DataError(format!("column '{}' is not numeric: {}", column.name(), e)))?;
    cast.f64()?
        .into_iter()
        .map(|v| v.ok_or_else(|| AutoMlError::DataError(format!("column '{}' has missing values", column.name()))))
        .collect()
}

/// Row-major `f64` matrix of every column of `df`
pub fn frame_to_matrix(df: &DataFrame) -> Result<Array2<f64>> {
    let (rows, cols) = (df.height(), df.width());
    let mut x = Array2::zeros((rows, cols));
    for (j, column) in df.get_columns().iter().enumerate() {
        for (i, v) in column_values(column)?.into_iter().enumerate() {
            x[[i, j]] = v;
        }
    }
    Ok(x)
}

/// Load features and a single-column target
pub fn load(features_path: &Path, target_path: &Path) -> Result<(Array2<f64>, Array1<f64>)> {
    // Both paths are checked before either file is parsed
    for path in [features_path, target_path] {
        if !path.exists() {
            return Err(AutoMlError::FileNotFound(path.display().to_string()));
        }
    }

    let features = read_table(features_path)?;
    let target = read_table(target_path)?;
    if target.width() != 1 {
        return Err(AutoMlError::MultiColumnTarget(target.width()));
    }
    if target.height() != features.height() {
        return Err(AutoMlError::ShapeError {
            expected: format!("{} target rows", features.height()),
            actual: format!("{} target rows", target.height()),
        });
    }

    let x = frame_to_matrix(&features)?;
    let y = Array1::from(column_values(&target.get_columns()[0])?);
    tracing::info!(rows = x.nrows(), features = x.ncols(), "dataset loaded");
    Ok((x, y))
}

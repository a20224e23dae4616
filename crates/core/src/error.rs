//! Error types for variokit

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for variokit operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No {kind} file matching {pattern} found in {}", dir.display())]
    MissingInput {
        kind: &'static str,
        pattern: &'static str,
        dir: PathBuf,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Variogram fit error: {0}")]
    VariogramFit(String),

    #[error("Cannot write raster {}: {reason}", path.display())]
    RasterWrite { path: PathBuf, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for variokit operations
pub type Result<T> = std::result::Result<T, Error>;

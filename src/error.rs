use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("key column not found in table {0}")]
    MissingKeyColumn(String),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error(
        "inconsistent vector length in table {table}: row {row} has {found} element(s), expected {expected}"
    )]
    InconsistentVectorLength {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unsupported stratification value: {0}")]
    UnsupportedStratificationValue(String),

    #[error("cannot read {path}: {source}")]
    FileNotReadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("join produced zero rows: {0}")]
    EmptyJoinResult(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("table error: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, MergeError>;

// crates/ufo-core/src/error.rs

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::location::LocationError;
use crate::transform::TransformError;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("storage error: {0}")]
    Location(#[from] LocationError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("table {table} has format {format}, expected {expected}")]
    UnexpectedFormat {
        table: String,
        format: String,
        expected: String,
    },
}

pub type Result<T> = std::result::Result<T, JobError>;

//! Error types for pupy
//!
//! Every failure propagates to the host runtime, which decides whether to
//! abort the simulation run. Nothing is retried.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// pupy error types
#[derive(Error, Debug)]
pub enum Error {
    /// The abstract actor contract was invoked directly
    #[error("Not implemented: {0}\nImplement PuppyActor::call for this actor")]
    NotImplemented(&'static str),

    /// Sequential gait source ran dry before the experiment ended
    #[error("Gait source exhausted\nSupply a gait source that does not terminate during the experiment")]
    GaitSourceExhausted,

    /// Invalid caller input (empty gait set, zero step size, short target list,
    /// non-finite attribute)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage layout violation or corrupt store file
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Write attempted after the store was closed
    #[error("Store closed: no further writes are possible")]
    StoreClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

use std::path::PathBuf;

use thiserror::Error;

/// Failures while persisting run artifacts.
#[derive(Error, Debug)]
pub enum SegconfError {
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize metrics for {path}: {source}")]
    MetricSerializeFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write confidence map {path}: {source}")]
    NpzWriteFailed {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpzError,
    },

    #[error("Failed to save checkpoint {path}: {reason}")]
    CheckpointSaveFailed { path: PathBuf, reason: String },

    #[error("Tensor readback failed: {reason}")]
    TensorReadFailed { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

pub type SegconfResult<T> = Result<T, SegconfError>;

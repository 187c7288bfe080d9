use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building networks or loading their weights.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The weight file does not exist.
    #[error("Weight file not found: {path}")]
    WeightFileNotFound {
        /// The missing file.
        path: PathBuf,
    },

    /// The weight file extension is not recognized.
    #[error("Unsupported weight file format: {path}")]
    UnsupportedWeightFormat {
        /// The offending file.
        path: PathBuf,
    },

    /// PyTorch checkpoints need the `pytorch` feature.
    #[error("Loading PyTorch weights requires the `pytorch` feature: {path}")]
    PyTorchSupportDisabled {
        /// The PyTorch checkpoint.
        path: PathBuf,
    },

    /// The recorder failed to read or apply the weights.
    #[error("Failed to load weights from {path}: {reason}")]
    WeightLoadingFailed {
        /// The weight file.
        path: PathBuf,
        /// Recorder error message.
        reason: String,
    },

    /// Logically inconsistent network configuration.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// Why the configuration was rejected.
        reason: String,
    },
}

/// A specialized `Result` type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

//! Error types for dataset discovery and item loading.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    /// An expected dataset directory does not exist.
    #[error("Dataset directory not found: {path}")]
    DirectoryNotFound {
        /// The missing directory.
        path: PathBuf,
    },

    /// Walking a dataset directory failed.
    #[error("Failed to read directory: {path}")]
    DirectoryReadFailed {
        /// The directory being walked.
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Discovery found nothing to load.
    #[error("No samples found in: {path}")]
    NoSamples {
        /// The directory or manifest that was searched.
        path: PathBuf,
    },

    /// Opening or decoding an image failed.
    #[error("Failed to open image: {path}")]
    ImageOpenFailed {
        /// The image file.
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Reading a `.npy` array failed.
    #[error("Failed to read NPY array: {path}")]
    NpyReadFailed {
        /// The array file.
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    /// Reading a manifest file failed.
    #[error("Failed to read manifest: {path}")]
    ManifestReadFailed {
        /// The manifest file.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest is not valid JSON for the expected schema.
    #[error("Failed to parse manifest: {path}")]
    ManifestParseFailed {
        /// The manifest file.
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The parts of one sample disagree on their shape.
    #[error("Shape mismatch in {path}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The offending file.
        path: PathBuf,
        /// Shape implied by the rest of the sample.
        expected: Vec<usize>,
        /// Shape found in the file.
        actual: Vec<usize>,
    },

    /// A path is not valid UTF-8.
    #[error("Path contains invalid UTF-8: {path}")]
    InvalidUtf8Path {
        /// The path with invalid UTF-8.
        path: PathBuf,
    },

    /// A data loader yielded no items.
    #[error("Data loader is empty")]
    EmptyLoader,

    /// A pass over the loader ended before every item was loaded.
    #[error("Data loader pass ended after {loaded} of {total} items")]
    IncompletePass {
        /// Items loaded before the pass stopped.
        loaded: usize,
        /// Items in the dataset.
        total: usize,
    },
}

/// A specialized `Result` type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;

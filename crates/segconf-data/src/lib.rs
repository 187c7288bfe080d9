//! # segconf-data
//!
//! Datasets, batchers and loader utilities for segconf.
//!
//! - [`CityscapesDataset`] / [`CityscapesBatcher`]: images and remapped label
//!   maps for MC-dropout evaluation.
//! - [`IouDataset`] / [`IouBatcher`]: manifest-driven samples for training the
//!   IoU/confidence network.
//! - [`RepeatingLoader`]: endless batches over a burn data loader.
//!
//! Datasets return raw `Vec` data; batchers create tensors on the target
//! device and apply ImageNet normalization to images.

mod cityscapes;
mod error;
mod iou_dataset;
mod normalize;
mod repeat;

pub use cityscapes::{CityscapesBatch, CityscapesBatcher, CityscapesDataset, CityscapesItem};
pub use error::{DatasetError, DatasetResult};
pub use iou_dataset::{IouBatch, IouBatcher, IouDataset, IouItem, IouRecord};
pub use normalize::{normalize_imagenet, IMAGENET_MEAN, IMAGENET_STD};
pub use repeat::{RepeatingIter, RepeatingLoader};

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    pub type TestBackend = NdArray;
}

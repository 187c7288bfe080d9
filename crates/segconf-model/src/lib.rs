//! # segconf-model
//!
//! Networks used by the uncertainty pipeline, built with Burn.
//!
//! - [`Fcn8s`]: VGG16-based FCN-8s segmentation network with Monte-Carlo
//!   dropout on its fully-convolutional head.
//! - [`IouConfNet`]: residual network predicting IoU and a per-pixel
//!   correctness confidence from a probability map and an image pair.
//!
//! The pipelines only depend on the [`SegmentationNetwork`] and
//! [`IouConfidenceNetwork`] traits, so any network honoring those contracts
//! can be swapped in.
//!
//! Stochastic behaviour is selected per call through [`InferenceMode`]
//! instead of by toggling state on a shared network.

mod error;
mod fcn8s;
mod iou_net;
mod mc_dropout;
mod mode;
mod resnet;
mod vgg;
pub mod weights;

use burn::prelude::*;

#[doc(inline)]
pub use error::{ModelError, ModelResult};
#[doc(inline)]
pub use fcn8s::{Fcn8s, Fcn8sConfig, Fcn8sRecord};
#[doc(inline)]
pub use iou_net::{IouConfNet, IouConfNetConfig, IouConfNetRecord, IouConfOutput};
#[doc(inline)]
pub use mc_dropout::{McDropout, McDropoutConfig};
#[doc(inline)]
pub use mode::InferenceMode;
#[doc(inline)]
pub use weights::{load_weights, WeightFormat};

/// A semantic segmentation network producing per-class scores.
pub trait SegmentationNetwork<B: Backend> {
    /// Class scores (pre-softmax) for a batch of images.
    ///
    /// # Shapes
    ///
    /// - images: `[batch_size, 3, height, width]`
    /// - output: `[batch_size, num_classes, height, width]`
    fn forward(&self, images: Tensor<B, 4>, mode: InferenceMode) -> Tensor<B, 4>;

    /// Number of classes scored by the network.
    fn num_classes(&self) -> usize;
}

/// A network predicting segmentation quality from a probability map and the
/// source/reconstructed image pair.
pub trait IouConfidenceNetwork<B: Backend> {
    /// # Shapes
    ///
    /// - prob: `[batch_size, num_classes, height, width]`
    /// - image_src, image_rec: `[batch_size, 3, height, width]`
    /// - output.iou: `[batch_size, num_iou_outputs]`
    /// - output.confidence: `[batch_size, 1, height, width]`
    fn forward(
        &self,
        prob: Tensor<B, 4>,
        image_src: Tensor<B, 4>,
        image_rec: Tensor<B, 4>,
    ) -> IouConfOutput<B>;
}

//! Per-pixel confidence loss.
//!
//! The confidence head is trained to predict whether the segmentation is
//! correct at each pixel. Each pixel's BCE is weighted by
//!
//! - `[label != ignore_index]`, and
//! - `w²`, where `w` is the max class probability (after a softmax over
//!   classes when `softmax_weighting` is set).
//!
//! The result is averaged over all pixels.

use burn::{
    config::Config,
    module::Module,
    nn::loss::Reduction,
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
};

use crate::bce::{BinaryCrossEntropy, BinaryCrossEntropyConfig};

/// `1.0` where the arg-max class of `prob` equals `labels`, `0.0` elsewhere.
///
/// # Shapes
///
/// - prob: `[batch_size, num_classes, height, width]`
/// - labels: `[batch_size, height, width]`
/// - output: `[batch_size, 1, height, width]`
pub fn correctness_mask<B: Backend>(prob: Tensor<B, 4>, labels: Tensor<B, 3, Int>) -> Tensor<B, 4> {
    let [batch_size, _, height, width] = prob.dims();
    let labels = labels.reshape([batch_size, 1, height, width]);

    prob.argmax(1).equal(labels).float()
}

#[derive(Config, Debug)]
pub struct ConfidenceLossConfig {
    /// Label excluded from the loss. Default: 19
    #[config(default = 19)]
    pub ignore_index: i64,
    /// Softmax `prob` over classes before taking the max for the weight.
    /// Default: true
    #[config(default = true)]
    pub softmax_weighting: bool,
    #[config(default = "BinaryCrossEntropyConfig::new()")]
    pub bce: BinaryCrossEntropyConfig,
}

impl ConfidenceLossConfig {
    pub fn init(&self) -> ConfidenceLoss {
        ConfidenceLoss {
            ignore_index: self.ignore_index,
            softmax_weighting: self.softmax_weighting,
            bce: self.bce.init(),
        }
    }
}

/// Weighted BCE between predicted confidence and segmentation correctness.
#[derive(Module, Clone, Debug)]
pub struct ConfidenceLoss {
    pub ignore_index: i64,
    pub softmax_weighting: bool,
    pub bce: BinaryCrossEntropy,
}

impl Default for ConfidenceLoss {
    fn default() -> Self {
        ConfidenceLossConfig::new().init()
    }
}

impl ConfidenceLoss {
    /// # Shapes
    ///
    /// - confidence: `[batch_size, 1, height, width]`, in `[0, 1]`
    /// - prob: `[batch_size, num_classes, height, width]`
    /// - labels: `[batch_size, height, width]`
    /// - output: `[1]`
    pub fn forward<B: Backend>(
        &self,
        confidence: Tensor<B, 4>,
        prob: Tensor<B, 4>,
        labels: Tensor<B, 3, Int>,
        reduction: Reduction,
    ) -> Tensor<B, 1> {
        let loss = self.forward_no_reduction(confidence, prob, labels);
        match reduction {
            Reduction::Mean | Reduction::Auto => loss.mean(),
            Reduction::Sum => loss.sum(),
        }
    }

    /// # Shapes
    ///
    /// - output: `[batch_size, 1, height, width]`
    pub fn forward_no_reduction<B: Backend>(
        &self,
        confidence: Tensor<B, 4>,
        prob: Tensor<B, 4>,
        labels: Tensor<B, 3, Int>,
    ) -> Tensor<B, 4> {
        self.assertions(&confidence, &prob, &labels);
        let [batch_size, _, height, width] = prob.dims();

        let correct = correctness_mask(prob.clone(), labels.clone());
        let keep = labels
            .not_equal_elem(self.ignore_index)
            .float()
            .reshape([batch_size, 1, height, width]);

        let prob = if self.softmax_weighting {
            softmax(prob, 1)
        } else {
            prob
        };
        let weight = prob.max_dim(1);

        self.bce.forward_no_reduction(confidence, correct) * keep * weight.clone() * weight
    }

    fn assertions<B: Backend>(
        &self,
        confidence: &Tensor<B, 4>,
        prob: &Tensor<B, 4>,
        labels: &Tensor<B, 3, Int>,
    ) {
        let [batch_size, _, height, width] = prob.dims();
        let conf_dims = confidence.dims();
        let label_dims = labels.dims();
        assert_eq!(
            conf_dims,
            [batch_size, 1, height, width],
            "Confidence shape ({conf_dims:?}) must be [batch_size, 1, height, width] of prob"
        );
        assert_eq!(
            label_dims,
            [batch_size, height, width],
            "Label shape ({label_dims:?}) must be [batch_size, height, width] of prob"
        );
    }
}

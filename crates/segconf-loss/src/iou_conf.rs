use burn::{
    config::Config,
    module::Module,
    nn::loss::Reduction,
    tensor::{backend::Backend, Int, Tensor},
};

use crate::{
    confidence::{ConfidenceLoss, ConfidenceLossConfig},
    masked_iou::{MaskedIouLoss, MaskedIouLossConfig},
};

#[derive(Config, Debug)]
pub struct IouConfLossConfig {
    #[config(default = "MaskedIouLossConfig::new()")]
    pub iou: MaskedIouLossConfig,
    #[config(default = "ConfidenceLossConfig::new()")]
    pub confidence: ConfidenceLossConfig,
}

impl IouConfLossConfig {
    pub fn init(&self) -> IouConfLoss {
        IouConfLoss {
            iou: self.iou.init(),
            confidence: self.confidence.init(),
        }
    }
}

/// Both task losses of one training step.
#[derive(Debug, Clone)]
pub struct IouConfLossOutput<B: Backend> {
    pub iou_loss: Tensor<B, 1>,
    pub conf_loss: Tensor<B, 1>,
    /// `iou_loss + conf_loss`.
    pub total: Tensor<B, 1>,
}

/// Unweighted sum of [`MaskedIouLoss`] and [`ConfidenceLoss`].
#[derive(Module, Clone, Debug)]
pub struct IouConfLoss {
    pub iou: MaskedIouLoss,
    pub confidence: ConfidenceLoss,
}

impl Default for IouConfLoss {
    fn default() -> Self {
        IouConfLossConfig::new().init()
    }
}

impl IouConfLoss {
    /// # Shapes
    ///
    /// - pred_iou, iou, valid: `[batch_size, num_iou_outputs]`
    /// - confidence: `[batch_size, 1, height, width]`
    /// - prob: `[batch_size, num_classes, height, width]`
    /// - labels: `[batch_size, height, width]`
    pub fn forward<B: Backend>(
        &self,
        pred_iou: Tensor<B, 2>,
        confidence: Tensor<B, 4>,
        iou: Tensor<B, 2>,
        valid: Tensor<B, 2>,
        prob: Tensor<B, 4>,
        labels: Tensor<B, 3, Int>,
    ) -> IouConfLossOutput<B> {
        let iou_loss = self.iou.forward(pred_iou, iou, valid, Reduction::Mean);
        let conf_loss = self
            .confidence
            .forward(confidence, prob, labels, Reduction::Mean);

        IouConfLossOutput {
            total: iou_loss.clone() + conf_loss.clone(),
            iou_loss,
            conf_loss,
        }
    }
}

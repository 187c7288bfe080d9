//! Smooth-L1 IoU regression with a validity mask.
//!
//! ```text
//! d = |pred - iou / scale|
//! l = valid · (0.5 · d² / β     if d < β
//!              d - 0.5 · β      otherwise)
//! loss = mean(l)
//! ```
//!
//! The mean runs over all elements, so masked entries still count towards
//! the divisor.

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    nn::loss::Reduction,
    tensor::{backend::Backend, Tensor},
};

#[derive(Config, Debug)]
pub struct MaskedIouLossConfig {
    /// Transition point between the quadratic and linear regimes. Default: 1.0
    #[config(default = 1.0)]
    pub beta: f64,
    /// Divisor bringing IoU labels onto the prediction scale. Default: 100.0
    #[config(default = 100.0)]
    pub target_scale: f64,
}

impl MaskedIouLossConfig {
    pub fn init(&self) -> MaskedIouLoss {
        self.assertions();
        MaskedIouLoss {
            beta: self.beta,
            target_scale: self.target_scale,
        }
    }

    fn assertions(&self) {
        assert!(
            self.beta > 0.0,
            "Beta for MaskedIouLoss must be positive, got {}",
            self.beta
        );
        assert!(
            self.target_scale > 0.0,
            "Target scale for MaskedIouLoss must be positive, got {}",
            self.target_scale
        );
    }
}

/// Masked smooth-L1 loss between predicted IoU and IoU labels.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct MaskedIouLoss {
    pub beta: f64,
    pub target_scale: f64,
}

impl Default for MaskedIouLoss {
    fn default() -> Self {
        MaskedIouLossConfig::new().init()
    }
}

impl ModuleDisplay for MaskedIouLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("beta", &self.beta)
            .add("target_scale", &self.target_scale)
            .optional()
    }
}

impl MaskedIouLoss {
    /// # Shapes
    ///
    /// - predictions: `[batch_size, num_iou_outputs]`, in `[0, 1]`
    /// - iou: `[batch_size, num_iou_outputs]`, in `[0, target_scale]`
    /// - valid: `[batch_size, num_iou_outputs]`, 0 or 1
    /// - output: `[1]`
    pub fn forward<B: Backend>(
        &self,
        predictions: Tensor<B, 2>,
        iou: Tensor<B, 2>,
        valid: Tensor<B, 2>,
        reduction: Reduction,
    ) -> Tensor<B, 1> {
        let loss = self.forward_no_reduction(predictions, iou, valid);
        match reduction {
            Reduction::Mean | Reduction::Auto => loss.mean(),
            Reduction::Sum => loss.sum(),
        }
    }

    /// # Shapes
    ///
    /// - predictions, iou, valid: `[batch_size, num_iou_outputs]`
    /// - output: `[batch_size, num_iou_outputs]`
    pub fn forward_no_reduction<B: Backend>(
        &self,
        predictions: Tensor<B, 2>,
        iou: Tensor<B, 2>,
        valid: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        self.assertions(&predictions, &iou, &valid);

        let targets = iou / self.target_scale;
        let diff = (predictions - targets).abs();

        let quadratic = diff.clone().powf_scalar(2.0) * (0.5 / self.beta);
        let linear = diff.clone() - 0.5 * self.beta;
        let smooth_l1 = quadratic.mask_where(diff.greater_equal_elem(self.beta), linear);

        smooth_l1 * valid
    }

    fn assertions<B: Backend>(
        &self,
        predictions: &Tensor<B, 2>,
        iou: &Tensor<B, 2>,
        valid: &Tensor<B, 2>,
    ) {
        let pred_dims = predictions.dims();
        let iou_dims = iou.dims();
        let valid_dims = valid.dims();
        assert_eq!(
            pred_dims, iou_dims,
            "Shape of predictions ({pred_dims:?}) must match IoU labels ({iou_dims:?})"
        );
        assert_eq!(
            pred_dims, valid_dims,
            "Shape of predictions ({pred_dims:?}) must match validity mask ({valid_dims:?})"
        );
    }
}

//! Binary cross-entropy on probabilities.
//!
//! ```text
//! l = -(t · max(log p, c) + (1 - t) · max(log(1 - p), c))
//! ```
//!
//! with `c = -100`, so predictions of exactly 0 or 1 give a finite loss.

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    nn::loss::Reduction,
    tensor::{backend::Backend, Tensor},
};

/// Configuration for creating a [binary cross-entropy loss](BinaryCrossEntropy).
#[derive(Config, Debug)]
pub struct BinaryCrossEntropyConfig {
    /// Lower bound applied to each log term. Default: -100
    #[config(default = "-100.0")]
    pub log_clamp: f64,
}

impl BinaryCrossEntropyConfig {
    pub fn init(&self) -> BinaryCrossEntropy {
        self.assertions();
        BinaryCrossEntropy {
            log_clamp: self.log_clamp,
        }
    }

    fn assertions(&self) {
        assert!(
            self.log_clamp < 0.0,
            "Log clamp for BinaryCrossEntropy must be negative, got {}",
            self.log_clamp
        );
    }
}

#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct BinaryCrossEntropy {
    pub log_clamp: f64,
}

impl Default for BinaryCrossEntropy {
    fn default() -> Self {
        BinaryCrossEntropyConfig::new().init()
    }
}

impl ModuleDisplay for BinaryCrossEntropy {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content.add("log_clamp", &self.log_clamp).optional()
    }
}

impl BinaryCrossEntropy {
    /// # Shapes
    ///
    /// - predictions: `[...dims]`, probabilities in `[0, 1]`
    /// - targets: `[...dims]`, in `[0, 1]`
    /// - output: `[1]`
    pub fn forward<B: Backend, const D: usize>(
        &self,
        predictions: Tensor<B, D>,
        targets: Tensor<B, D>,
        reduction: Reduction,
    ) -> Tensor<B, 1> {
        let loss = self.forward_no_reduction(predictions, targets);
        match reduction {
            Reduction::Mean | Reduction::Auto => loss.mean(),
            Reduction::Sum => loss.sum(),
        }
    }

    /// # Shapes
    ///
    /// - predictions: `[...dims]`
    /// - targets: `[...dims]`
    /// - output: `[...dims]`
    pub fn forward_no_reduction<B: Backend, const D: usize>(
        &self,
        predictions: Tensor<B, D>,
        targets: Tensor<B, D>,
    ) -> Tensor<B, D> {
        self.assertions(&predictions, &targets);

        let log_p = predictions.clone().log().clamp_min(self.log_clamp);
        let log_not_p = (Tensor::ones_like(&predictions) - predictions)
            .log()
            .clamp_min(self.log_clamp);
        let not_targets = Tensor::ones_like(&targets) - targets.clone();

        (targets * log_p + not_targets * log_not_p).neg()
    }

    fn assertions<B: Backend, const D: usize>(
        &self,
        predictions: &Tensor<B, D>,
        targets: &Tensor<B, D>,
    ) {
        let pred_dims = predictions.dims();
        let target_dims = targets.dims();
        assert_eq!(
            pred_dims, target_dims,
            "Shape of predictions ({pred_dims:?}) must match targets ({target_dims:?})"
        );
    }
}

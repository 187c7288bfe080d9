//! # Monte-Carlo Dropout
//!
//! Element-wise dropout whose activity is decided by the caller's
//! [`InferenceMode`] rather than by the autodiff backend. Keeping it active
//! at inference time turns each forward pass into a sample from the
//! network's predictive distribution.

use burn::{prelude::*, tensor::Distribution};

use crate::mode::InferenceMode;

/// Configuration for the [`McDropout`] module.
#[derive(Config, Debug)]
pub struct McDropoutConfig {
    /// Probability of zeroing an element.
    #[config(default = "0.5")]
    pub prob: f64,
}

impl McDropoutConfig {
    /// Initializes a new [`McDropout`] module.
    pub fn init(&self) -> McDropout {
        assert!(
            (0.0..1.0).contains(&self.prob),
            "Dropout probability must be in [0, 1), got {}",
            self.prob
        );
        McDropout { prob: self.prob }
    }
}

/// Dropout driven by an explicit [`InferenceMode`].
#[derive(Module, Clone, Debug)]
pub struct McDropout {
    prob: f64,
}

impl McDropout {
    pub const fn prob(&self) -> f64 {
        self.prob
    }

    /// Zero each element with probability `prob` and rescale survivors by
    /// `1 / (1 - prob)` when `mode` keeps dropout active; identity otherwise.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
        mode: InferenceMode,
    ) -> Tensor<B, D> {
        if !mode.dropout_active() || self.prob == 0.0 {
            return input;
        }
        let keep_prob = 1.0 - self.prob;

        let mask = Tensor::random(
            input.shape(),
            Distribution::Bernoulli(keep_prob),
            &input.device(),
        );

        input * mask / keep_prob
    }
}

use burn::{prelude::*, tensor::activation::softmax};
use segconf_model::{InferenceMode, SegmentationNetwork};

use crate::{
    entropy::{entropy_map, one_vs_rest_confidence},
    error::{UncertaintyError, UncertaintyResult},
};

/// Configuration for [`McDropoutEstimator`].
#[derive(Config, Debug)]
pub struct McDropoutEstimatorConfig {
    /// Stochastic forward passes per batch.
    #[config(default = "50")]
    pub samples: usize,
}

impl McDropoutEstimatorConfig {
    pub fn init(&self) -> UncertaintyResult<McDropoutEstimator> {
        if self.samples == 0 {
            return Err(UncertaintyError::InvalidSampleCount {
                samples: self.samples,
            });
        }
        Ok(McDropoutEstimator {
            samples: self.samples,
        })
    }
}

/// Aggregated result of `S` stochastic passes over one batch.
#[derive(Debug, Clone)]
pub struct UncertaintyEstimate<B: Backend> {
    /// Mean class scores over the samples, `[N, C, H, W]`.
    pub mean_scores: Tensor<B, 4>,
    /// Softmax of `mean_scores` over classes, `[N, C, H, W]`.
    pub probs: Tensor<B, 4>,
    /// `Σ_c p·log p` per pixel, `[N, H, W]`.
    pub entropy_map: Tensor<B, 3>,
    /// One-vs-rest binary entropy per class, `[N, C]`.
    pub class_confidence: Tensor<B, 2>,
    /// Arg-max class per pixel, `[N, H, W]`.
    pub prediction: Tensor<B, 3, Int>,
}

/// Monte-Carlo dropout estimator.
#[derive(Debug, Clone, Copy)]
pub struct McDropoutEstimator {
    samples: usize,
}

impl McDropoutEstimator {
    pub const fn samples(&self) -> usize {
        self.samples
    }

    /// Runs `network` [`samples`](Self::samples) times with dropout active
    /// and aggregates the passes.
    ///
    /// Sample outputs are detached; no gradients flow through the estimate.
    /// Passes are unseeded, so results differ between calls.
    pub fn estimate<B, N>(&self, network: &N, images: Tensor<B, 4>) -> UncertaintyEstimate<B>
    where
        B: Backend,
        N: SegmentationNetwork<B>,
    {
        let passes = (0..self.samples)
            .map(|_| {
                network
                    .forward(images.clone(), InferenceMode::McDropout)
                    .detach()
            })
            .collect::<Vec<_>>();

        let stacked: Tensor<B, 5> = Tensor::stack(passes, 0);
        let [_, batch_size, num_classes, height, width] = stacked.dims();
        tracing::debug!(
            samples = self.samples,
            batch_size,
            num_classes,
            height,
            width,
            "aggregating MC-dropout passes"
        );

        let mean_scores: Tensor<B, 4> = stacked
            .mean_dim(0)
            .reshape([batch_size, num_classes, height, width]);
        let probs = softmax(mean_scores.clone(), 1);

        let prediction = mean_scores
            .clone()
            .argmax(1)
            .reshape([batch_size, height, width]);

        UncertaintyEstimate {
            entropy_map: entropy_map(probs.clone()),
            class_confidence: one_vs_rest_confidence(probs.clone()),
            mean_scores,
            probs,
            prediction,
        }
    }
}

//! # segconf-uncertainty
//!
//! Predictive uncertainty for segmentation networks via Monte-Carlo dropout.
//!
//! [`McDropoutEstimator`] runs a [`SegmentationNetwork`] several times with
//! dropout active, averages the class scores and derives:
//!
//! - the mean class probabilities (softmax of the mean scores),
//! - a per-pixel entropy map ([`entropy_map`]),
//! - a per-class one-vs-rest binary entropy, spatially averaged
//!   ([`one_vs_rest_confidence`]),
//! - the arg-max prediction.
//!
//! Entropies are reported with the `Σ p·log p` sign convention, so they are
//! non-positive and `0` means fully confident.
//!
//! [`SegmentationNetwork`]: segconf_model::SegmentationNetwork

mod entropy;
mod error;
mod estimator;

pub use entropy::{entropy_map, one_vs_rest_confidence, LOG_EPSILON};
pub use error::{UncertaintyError, UncertaintyResult};
pub use estimator::{McDropoutEstimator, McDropoutEstimatorConfig, UncertaintyEstimate};

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    pub type TestBackend = NdArray;
}

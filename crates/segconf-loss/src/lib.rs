//! Loss functions for training the IoU/confidence network.
//!
//! - [`BinaryCrossEntropy`]: element-wise BCE on probabilities with the log
//!   clamped at `-100`.
//! - [`MaskedIouLoss`]: smooth-L1 regression of IoU targets on the 0-100
//!   scale, zeroed where the validity mask is 0.
//! - [`ConfidenceLoss`]: BCE between predicted confidence and per-pixel
//!   correctness of the segmentation, weighted by the squared max class
//!   probability and an ignore mask.
//! - [`IouConfLoss`]: sum of the two task losses.
//!
//! Masked losses average over every element, masked or not.
//!
//! ```rust
//! use segconf_loss::{IouConfLossConfig, MaskedIouLossConfig};
//!
//! let loss = IouConfLossConfig::new()
//!     .with_iou(MaskedIouLossConfig::new().with_beta(1.0))
//!     .init();
//! # let _ = loss;
//! ```

mod bce;
mod confidence;
mod iou_conf;
mod masked_iou;

pub use bce::{BinaryCrossEntropy, BinaryCrossEntropyConfig};
pub use confidence::{correctness_mask, ConfidenceLoss, ConfidenceLossConfig};
pub use iou_conf::{IouConfLoss, IouConfLossConfig, IouConfLossOutput};
pub use masked_iou::{MaskedIouLoss, MaskedIouLossConfig};

//! # segconf-metric
//!
//! Confusion-matrix statistics for semantic segmentation.
//!
//! The crate is backend independent: it works on flattened label maps
//! (`&[i64]`) so the evaluation driver can feed it whatever it pulled out
//! of a tensor.
//!
//! ## Numeric contract
//!
//! Every ratio produced by [`result_stats`] carries an additive epsilon of
//! [`STATS_EPSILON`] in its denominator. Absent classes therefore report `0`
//! rather than `NaN`. [`nanmean`] is the reduction used for display
//! averages and skips any `NaN` that reaches it from elsewhere.
//!
//! ## Usage
//!
//! ```rust
//! use segconf_metric::{fast_hist, result_stats};
//!
//! let gt = [0, 0, 1, 1, 255];
//! let pred = [0, 1, 1, 1, 0];
//! let hist = fast_hist(&gt, &pred, 2);
//! assert_eq!(hist.total(), 4);
//!
//! let stats = result_stats(&hist);
//! assert!((stats.acc_overall - 75.0).abs() < 1e-4);
//! ```

mod confusion;
mod labels;
mod record;
mod reduce;
mod stats;

pub use confusion::{fast_hist, ConfusionHistogram};
pub use labels::{id2label, remap_label_ids, CITYSCAPES_NUM_CLASSES, IGNORE_LABEL};
pub use record::MetricRecord;
pub use reduce::nanmean;
pub use stats::{result_stats, SegmentationStats, STATS_EPSILON};

//! # segconf
//!
//! Uncertainty estimation for semantic segmentation with Burn.
//!
//! - [`evaluation`]: Monte-Carlo dropout evaluation of a segmentation
//!   network with per-image confusion statistics and entropy maps.
//! - [`training`]: iteration-driven training of the IoU/confidence network.
//! - [`backend`]: compile-time backend selection (`ndarray`, `wgpu`, `cuda`).
//!
//! The building blocks live in the member crates and are re-exported here.

pub mod backend;
mod error;
pub mod evaluation;
pub mod training;

pub use error::{SegconfError, SegconfResult};

#[doc(inline)]
pub use segconf_data as data;
#[doc(inline)]
pub use segconf_loss as loss;
#[doc(inline)]
pub use segconf_metric as metric;
#[doc(inline)]
pub use segconf_model as model;
#[doc(inline)]
pub use segconf_uncertainty as uncertainty;

//! Compile-time backend selection.
//!
//! `cuda` wins over `wgpu`, which wins over the default `ndarray` CPU
//! backend. Evaluation runs on [`EvalBackend`] directly; training wraps the
//! same backend in [`Autodiff`] as [`TrainingBackend`], so checkpoints and
//! evaluation always share one device type.

use std::fmt;

use burn::{backend::Autodiff, prelude::Backend};
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        pub type EvalBackend = burn::backend::cuda::Cuda;
        const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        pub type EvalBackend = burn::backend::wgpu::Wgpu;
        const BACKEND_NAME: &str = "WGPU (GPU)";
    } else {
        pub type EvalBackend = burn::backend::ndarray::NdArray;
        const BACKEND_NAME: &str = "NdArray (CPU)";
    }
}

/// Backend used by the training loop.
pub type TrainingBackend = Autodiff<EvalBackend>;

/// Device shared by both backends.
pub type SelectedDevice = <EvalBackend as Backend>::Device;

/// Backend and device a command runs on.
#[derive(Debug, Clone)]
pub struct RunTarget {
    pub backend: &'static str,
    pub device: SelectedDevice,
}

impl RunTarget {
    /// The compiled-in backend on its default device.
    pub fn detect() -> Self {
        Self {
            backend: BACKEND_NAME,
            device: SelectedDevice::default(),
        }
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {:?}", self.backend, self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(any(feature = "cuda", feature = "wgpu")))]
    fn default_target_is_cpu() {
        let target = RunTarget::detect();

        assert_eq!(target.backend, "NdArray (CPU)");
        assert!(target.to_string().starts_with("NdArray (CPU) on "));
    }
}

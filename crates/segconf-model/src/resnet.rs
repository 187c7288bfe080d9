//! Residual trunk of the IoU/confidence network.
//!
//! The stem accepts an arbitrary channel count (probability map stacked
//! with the image pair), followed by stages of two-layer residual blocks.

use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

/// Residual trunk: stem + one [`ResidualStage`] per entry of `blocks`.
///
/// Stage `i` has `base_channels * 2^i` channels. Every stage after the first
/// halves the resolution, so the trunk output has stride `4 * 2^(stages-1)`.
#[derive(Module, Debug)]
pub struct ResidualTrunk<B: Backend> {
    stem: Stem<B>,
    stages: Vec<ResidualStage<B>>,
}

impl<B: Backend> ResidualTrunk<B> {
    pub fn new(
        in_channels: usize,
        base_channels: usize,
        blocks: &[usize],
        device: &Device<B>,
    ) -> Self {
        let stem = Stem::new(in_channels, base_channels, device);

        let mut channels = base_channels;
        let stages = blocks
            .iter()
            .enumerate()
            .map(|(i, &num_blocks)| {
                let (out_channels, stride) = if i == 0 {
                    (base_channels, 1)
                } else {
                    (channels * 2, 2)
                };
                let stage = ResidualStage::new(num_blocks, channels, out_channels, stride, device);
                channels = out_channels;
                stage
            })
            .collect();

        Self { stem, stages }
    }

    /// Channels produced by a trunk with this layout.
    pub fn out_channels(base_channels: usize, num_stages: usize) -> usize {
        base_channels << num_stages.saturating_sub(1)
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.stages
            .iter()
            .fold(self.stem.forward(input), |x, stage| stage.forward(x))
    }
}

/// 7x7 stride-2 convolution, batch norm, ReLU and a stride-2 max pool.
#[derive(Module, Debug)]
pub struct Stem<B: Backend> {
    conv: ConvBn<B>,
    pool: MaxPool2d,
}

impl<B: Backend> Stem<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(relu(self.conv.forward(input)))
    }

    pub fn new(in_channels: usize, out_channels: usize, device: &Device<B>) -> Self {
        Self {
            conv: ConvBn::new(in_channels, out_channels, 7, 2, device),
            pool: MaxPool2dConfig::new([3, 3])
                .with_strides([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
        }
    }
}

/// A sequence of [`ResidualBlock`]s; only the first one changes stride/width.
#[derive(Module, Debug)]
pub struct ResidualStage<B: Backend> {
    blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> ResidualStage<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.blocks
            .iter()
            .fold(input, |x, block| block.forward(x))
    }

    pub fn new(
        num_blocks: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        device: &Device<B>,
    ) -> Self {
        let blocks = (0..num_blocks)
            .map(|i| match i {
                0 => ResidualBlock::new(in_channels, out_channels, stride, device),
                _ => ResidualBlock::new(out_channels, out_channels, 1, device),
            })
            .collect();

        Self { blocks }
    }
}

/// `relu(branch(x) + shortcut(x))` with a two-layer 3x3 branch.
///
/// The shortcut is the identity unless the block changes stride or width,
/// in which case a strided 1x1 [`ConvBn`] matches the shapes.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    branch_in: ConvBn<B>,
    branch_out: ConvBn<B>,
    shortcut: Option<ConvBn<B>>,
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let skip = self
            .shortcut
            .as_ref()
            .map_or_else(|| input.clone(), |shortcut| shortcut.forward(input.clone()));
        let branch = self
            .branch_out
            .forward(relu(self.branch_in.forward(input)));

        relu(branch + skip)
    }

    pub fn new(in_channels: usize, out_channels: usize, stride: usize, device: &Device<B>) -> Self {
        let needs_projection = stride != 1 || in_channels != out_channels;

        Self {
            branch_in: ConvBn::new(in_channels, out_channels, 3, stride, device),
            branch_out: ConvBn::new(out_channels, out_channels, 3, 1, device),
            shortcut: needs_projection
                .then(|| ConvBn::new(in_channels, out_channels, 1, stride, device)),
        }
    }
}

/// Bias-free square convolution with "same" padding, followed by batch norm.
#[derive(Module, Debug)]
pub struct ConvBn<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> ConvBn<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(input))
    }

    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        device: &Device<B>,
    ) -> Self {
        let padding = kernel / 2;
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel, kernel])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_bias(false)
            .with_initializer(Initializer::KaimingNormal {
                gain: SQRT_2,
                fan_out_only: true,
            })
            .init(device);

        Self {
            conv,
            bn: BatchNormConfig::new(out_channels).init(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn residual_trunk_output_shape() {
        let device = Default::default();
        let trunk = ResidualTrunk::<TestBackend>::new(9, 8, &[1, 1, 1], &device);

        let input =
            Tensor::<TestBackend, 4>::random([2, 9, 64, 64], Distribution::Normal(0.0, 1.0), &device);
        let output = trunk.forward(input);

        // stem /4, then two strided stages /4
        assert_eq!(output.dims(), [2, 32, 4, 4]);
        assert_eq!(ResidualTrunk::<TestBackend>::out_channels(8, 3), 32);
    }

    #[test]
    fn residual_block_projects_shortcut_when_shape_changes() {
        let device = Default::default();
        let block = ResidualBlock::<TestBackend>::new(4, 8, 2, &device);
        assert!(block.shortcut.is_some());

        let same = ResidualBlock::<TestBackend>::new(8, 8, 1, &device);
        assert!(same.shortcut.is_none());

        let input = Tensor::<TestBackend, 4>::ones([1, 4, 8, 8], &device);
        assert_eq!(block.forward(input).dims(), [1, 8, 4, 4]);
    }

    #[test]
    fn identity_block_output_is_rectified() {
        let device = Default::default();
        let block = ResidualBlock::<TestBackend>::new(6, 6, 1, &device);

        let input =
            Tensor::<TestBackend, 4>::random([1, 6, 5, 7], Distribution::Normal(0.0, 1.0), &device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [1, 6, 5, 7]);
        let values = output.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|&v| v >= 0.0));
    }
}

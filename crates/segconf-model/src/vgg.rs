//! VGG16 feature trunk used by FCN-8s.
//!
//! Five conv stages each closed by a 2x2 max pool. FCN-8s taps the
//! outputs of stages 3, 4 and 5 (strides 8, 16 and 32).

use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Convolutions per VGG16 stage.
const VGG16_STAGE_DEPTHS: [usize; 5] = [2, 2, 3, 3, 3];

/// Channel multipliers per stage, relative to the base width.
const VGG16_STAGE_WIDTHS: [usize; 5] = [1, 2, 4, 8, 8];

/// Pooled feature maps consumed by the FCN-8s head.
#[derive(Debug, Clone)]
pub struct VggFeatures<B: Backend> {
    /// Stride 8.
    pub pool3: Tensor<B, 4>,
    /// Stride 16.
    pub pool4: Tensor<B, 4>,
    /// Stride 32.
    pub pool5: Tensor<B, 4>,
}

/// VGG16 convolutional trunk.
#[derive(Module, Debug)]
pub struct Vgg16Features<B: Backend> {
    stages: Vec<VggStage<B>>,
}

impl<B: Backend> Vgg16Features<B> {
    /// `base_channels` is 64 for the standard VGG16 widths.
    pub fn new(base_channels: usize, batch_norm: bool, device: &Device<B>) -> Self {
        let mut in_channels = 3;
        let stages = VGG16_STAGE_DEPTHS
            .iter()
            .zip(VGG16_STAGE_WIDTHS)
            .map(|(&depth, width)| {
                let out_channels = base_channels * width;
                let stage = VggStage::new(in_channels, out_channels, depth, batch_norm, device);
                in_channels = out_channels;
                stage
            })
            .collect();

        Self { stages }
    }

    /// Output channels of the pool3, pool4 and pool5 taps.
    pub fn tap_channels(base_channels: usize) -> [usize; 3] {
        [
            base_channels * VGG16_STAGE_WIDTHS[2],
            base_channels * VGG16_STAGE_WIDTHS[3],
            base_channels * VGG16_STAGE_WIDTHS[4],
        ]
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> VggFeatures<B> {
        let mut taps = Vec::with_capacity(3);
        let mut x = input;
        for (index, stage) in self.stages.iter().enumerate() {
            x = stage.forward(x);
            if index >= 2 {
                taps.push(x.clone());
            }
        }

        let pool5 = x;
        let pool4 = taps.swap_remove(1);
        let pool3 = taps.swap_remove(0);
        VggFeatures {
            pool3,
            pool4,
            pool5,
        }
    }
}

/// A run of 3x3 convolutions followed by a 2x2 max pool.
#[derive(Module, Debug)]
pub struct VggStage<B: Backend> {
    convs: Vec<VggConvLayer<B>>,
    pool: MaxPool2d,
}

impl<B: Backend> VggStage<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = input;
        for conv in &self.convs {
            x = conv.forward(x);
        }
        self.pool.forward(x)
    }

    pub fn new(
        in_channels: usize,
        out_channels: usize,
        depth: usize,
        batch_norm: bool,
        device: &Device<B>,
    ) -> Self {
        let convs = (0..depth)
            .map(|i| {
                let input = if i == 0 { in_channels } else { out_channels };
                VggConvLayer::new(input, out_channels, batch_norm, device)
            })
            .collect();
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self { convs, pool }
    }
}

/// VGG convolution layer with optional batch normalization.
#[derive(Module, Debug)]
pub struct VggConvLayer<B: Backend> {
    conv: Conv2d<B>,
    batch_norm: Option<BatchNorm<B, 2>>,
    relu: Relu,
}

impl<B: Backend> VggConvLayer<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(input);
        let out = match &self.batch_norm {
            Some(bn) => bn.forward(out),
            None => out,
        };
        self.relu.forward(out)
    }

    pub fn new(
        in_channels: usize,
        out_channels: usize,
        batch_norm: bool,
        device: &Device<B>,
    ) -> Self {
        let initializer = Initializer::KaimingNormal {
            gain: SQRT_2,
            fan_out_only: true,
        };

        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_stride([1, 1])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(!batch_norm)
            .with_initializer(initializer)
            .init(device);

        let batch_norm = batch_norm.then(|| BatchNormConfig::new(out_channels).init(device));

        Self {
            conv,
            batch_norm,
            relu: Relu::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn vgg16_features_tap_strides_8_16_32() {
        let device = Default::default();
        let trunk = Vgg16Features::<TestBackend>::new(4, false, &device);

        let input =
            Tensor::<TestBackend, 4>::random([1, 3, 64, 64], Distribution::Normal(0.0, 1.0), &device);
        let features = trunk.forward(input);

        assert_eq!(features.pool3.dims(), [1, 16, 8, 8]);
        assert_eq!(features.pool4.dims(), [1, 32, 4, 4]);
        assert_eq!(features.pool5.dims(), [1, 32, 2, 2]);
        assert_eq!(Vgg16Features::<TestBackend>::tap_channels(4), [16, 32, 32]);
    }
}

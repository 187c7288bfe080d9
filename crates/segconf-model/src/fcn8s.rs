//! # FCN-8s
//!
//! Fully-convolutional VGG16 segmentation network with three-level skip
//! fusion. Dropout sits after fc6 and fc7 and is driven by
//! [`InferenceMode`], so the same weights serve deterministic evaluation
//! and Monte-Carlo sampling.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

use crate::{
    error::{ModelError, ModelResult},
    mc_dropout::{McDropout, McDropoutConfig},
    mode::InferenceMode,
    vgg::Vgg16Features,
    SegmentationNetwork,
};

/// Configuration for [`Fcn8s`].
#[derive(Config, Debug)]
pub struct Fcn8sConfig {
    /// Number of output classes.
    #[config(default = "19")]
    pub num_classes: usize,
    /// Width of the fc6/fc7 convolutions.
    #[config(default = "4096")]
    pub fc_channels: usize,
    /// Dropout probability after fc6 and fc7.
    #[config(default = "0.5")]
    pub dropout: f64,
    /// Width of the first VGG stage.
    #[config(default = "64")]
    pub base_channels: usize,
    #[config(default = "false")]
    pub batch_norm: bool,
}

impl Fcn8sConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<Fcn8s<B>> {
        if self.num_classes == 0 {
            return Err(ModelError::InvalidConfiguration {
                reason: "num_classes must be positive".to_string(),
            });
        }
        if self.fc_channels == 0 || self.base_channels == 0 {
            return Err(ModelError::InvalidConfiguration {
                reason: format!(
                    "channel widths must be positive (fc_channels = {}, base_channels = {})",
                    self.fc_channels, self.base_channels
                ),
            });
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::InvalidConfiguration {
                reason: format!("dropout must be in [0, 1), got {}", self.dropout),
            });
        }

        let [pool3_channels, pool4_channels, pool5_channels] =
            Vgg16Features::<B>::tap_channels(self.base_channels);

        let fc6 = Conv2dConfig::new([pool5_channels, self.fc_channels], [7, 7])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .init(device);
        let fc7 = Conv2dConfig::new([self.fc_channels, self.fc_channels], [1, 1]).init(device);
        let dropout = McDropoutConfig::new().with_prob(self.dropout);

        let score = |channels: usize| {
            Conv2dConfig::new([channels, self.num_classes], [1, 1]).init(device)
        };

        Ok(Fcn8s {
            features: Vgg16Features::new(self.base_channels, self.batch_norm, device),
            fc6,
            drop6: dropout.init(),
            fc7,
            drop7: dropout.init(),
            relu: Relu::new(),
            score_fr: score(self.fc_channels),
            score_pool4: score(pool4_channels),
            score_pool3: score(pool3_channels),
            num_classes: self.num_classes,
        })
    }
}

/// FCN-8s segmentation network.
#[derive(Module, Debug)]
pub struct Fcn8s<B: Backend> {
    features: Vgg16Features<B>,
    fc6: Conv2d<B>,
    drop6: McDropout,
    fc7: Conv2d<B>,
    drop7: McDropout,
    relu: Relu,
    score_fr: Conv2d<B>,
    score_pool4: Conv2d<B>,
    score_pool3: Conv2d<B>,
    num_classes: usize,
}

impl<B: Backend> Fcn8s<B> {
    /// # Shapes
    ///
    /// - images: `[batch_size, 3, height, width]`
    /// - output: `[batch_size, num_classes, height, width]`
    pub fn forward(&self, images: Tensor<B, 4>, mode: InferenceMode) -> Tensor<B, 4> {
        let [_, _, height, width] = images.dims();
        let features = self.features.forward(images);

        let x = self.relu.forward(self.fc6.forward(features.pool5));
        let x = self.drop6.forward(x, mode);
        let x = self.relu.forward(self.fc7.forward(x));
        let x = self.drop7.forward(x, mode);

        let score = self.score_fr.forward(x);

        let pool4 = self.score_pool4.forward(features.pool4);
        let score = upsample_like(score, &pool4) + pool4;

        let pool3 = self.score_pool3.forward(features.pool3);
        let score = upsample_like(score, &pool3) + pool3;

        upsample(score, [height, width])
    }
}

impl<B: Backend> SegmentationNetwork<B> for Fcn8s<B> {
    fn forward(&self, images: Tensor<B, 4>, mode: InferenceMode) -> Tensor<B, 4> {
        Self::forward(self, images, mode)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

fn upsample<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [_, _, h, w] = x.dims();
    if [h, w] == size {
        return x;
    }
    interpolate(x, size, InterpolateOptions::new(InterpolateMode::Bilinear))
}

fn upsample_like<B: Backend>(x: Tensor<B, 4>, target: &Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, h, w] = target.dims();
    upsample(x, [h, w])
}

//! IoU and confidence prediction network.
//!
//! The probability map and both images are stacked channel-wise and fed
//! through a residual trunk. Two heads read the trunk output: a pooled
//! linear head regressing IoU in `[0, 1]`, and a 1x1 convolution producing a
//! per-pixel correctness probability, upsampled back to input resolution
//! with nearest-neighbour interpolation.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{
        activation::sigmoid,
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

use crate::{
    error::{ModelError, ModelResult},
    resnet::ResidualTrunk,
    IouConfidenceNetwork,
};

/// Configuration for [`IouConfNet`].
#[derive(Config, Debug)]
pub struct IouConfNetConfig {
    /// Channels of the probability map.
    #[config(default = "19")]
    pub num_classes: usize,
    /// IoU values predicted per image. `1` for a scalar IoU, `num_classes`
    /// for per-class IoU.
    #[config(default = "1")]
    pub num_iou_outputs: usize,
    #[config(default = "64")]
    pub base_channels: usize,
    /// Residual blocks per trunk stage.
    #[config(default = "vec![2, 2, 2, 2]")]
    pub blocks: Vec<usize>,
}

impl IouConfNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<IouConfNet<B>> {
        if self.num_classes == 0 || self.num_iou_outputs == 0 {
            return Err(ModelError::InvalidConfiguration {
                reason: format!(
                    "num_classes ({}) and num_iou_outputs ({}) must be positive",
                    self.num_classes, self.num_iou_outputs
                ),
            });
        }
        if self.blocks.is_empty() || self.blocks.contains(&0) {
            return Err(ModelError::InvalidConfiguration {
                reason: format!("every trunk stage needs at least one block: {:?}", self.blocks),
            });
        }

        let in_channels = self.num_classes + 6;
        let trunk_channels = ResidualTrunk::<B>::out_channels(self.base_channels, self.blocks.len());

        Ok(IouConfNet {
            trunk: ResidualTrunk::new(in_channels, self.base_channels, &self.blocks, device),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            iou_head: LinearConfig::new(trunk_channels, self.num_iou_outputs).init(device),
            conf_head: Conv2dConfig::new([trunk_channels, 1], [1, 1]).init(device),
        })
    }
}

/// Predicted IoU and per-pixel confidence.
#[derive(Debug, Clone)]
pub struct IouConfOutput<B: Backend> {
    /// `[batch_size, num_iou_outputs]`, in `[0, 1]`.
    pub iou: Tensor<B, 2>,
    /// `[batch_size, 1, height, width]`, in `[0, 1]`.
    pub confidence: Tensor<B, 4>,
}

#[derive(Module, Debug)]
pub struct IouConfNet<B: Backend> {
    trunk: ResidualTrunk<B>,
    pool: AdaptiveAvgPool2d,
    iou_head: Linear<B>,
    conf_head: Conv2d<B>,
}

impl<B: Backend> IouConfNet<B> {
    pub fn forward(
        &self,
        prob: Tensor<B, 4>,
        image_src: Tensor<B, 4>,
        image_rec: Tensor<B, 4>,
    ) -> IouConfOutput<B> {
        let [batch_size, _, height, width] = prob.dims();

        let x = Tensor::cat(vec![prob, image_src, image_rec], 1);
        let features = self.trunk.forward(x);

        let pooled = self.pool.forward(features.clone());
        let [_, channels, _, _] = pooled.dims();
        let iou = sigmoid(self.iou_head.forward(pooled.reshape([batch_size, channels])));

        let confidence = interpolate(
            self.conf_head.forward(features),
            [height, width],
            InterpolateOptions::new(InterpolateMode::Nearest),
        );

        IouConfOutput {
            iou,
            confidence: sigmoid(confidence),
        }
    }
}

impl<B: Backend> IouConfidenceNetwork<B> for IouConfNet<B> {
    fn forward(
        &self,
        prob: Tensor<B, 4>,
        image_src: Tensor<B, 4>,
        image_rec: Tensor<B, 4>,
    ) -> IouConfOutput<B> {
        Self::forward(self, prob, image_src, image_rec)
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Distribution;

    use super::*;
    use crate::tests::{TestAutodiffBackend, TestBackend};

    #[test]
    fn iou_conf_net_output_shapes_and_range() {
        let device = Default::default();
        let model = IouConfNetConfig::new()
            .with_num_classes(4)
            .with_num_iou_outputs(4)
            .with_base_channels(8)
            .with_blocks(vec![1, 1])
            .init::<TestBackend>(&device)
            .unwrap();

        let prob = Tensor::<TestBackend, 4>::random([2, 4, 32, 48], Distribution::Default, &device);
        let src =
            Tensor::<TestBackend, 4>::random([2, 3, 32, 48], Distribution::Normal(0.0, 1.0), &device);
        let rec =
            Tensor::<TestBackend, 4>::random([2, 3, 32, 48], Distribution::Normal(0.0, 1.0), &device);

        let output = model.forward(prob, src, rec);

        assert_eq!(output.iou.dims(), [2, 4]);
        assert_eq!(output.confidence.dims(), [2, 1, 32, 48]);

        let conf = output.confidence.into_data().to_vec::<f32>().unwrap();
        assert!(conf.iter().all(|v| (0.0..=1.0).contains(v)));
        let iou = output.iou.into_data().to_vec::<f32>().unwrap();
        assert!(iou.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn iou_conf_net_backpropagates_through_both_heads() {
        let device = Default::default();
        let model = IouConfNetConfig::new()
            .with_num_classes(3)
            .with_base_channels(4)
            .with_blocks(vec![1, 1])
            .init::<TestAutodiffBackend>(&device)
            .unwrap();

        let prob =
            Tensor::<TestAutodiffBackend, 4>::random([1, 3, 16, 16], Distribution::Default, &device);
        let src = Tensor::<TestAutodiffBackend, 4>::zeros([1, 3, 16, 16], &device);
        let rec = Tensor::<TestAutodiffBackend, 4>::ones([1, 3, 16, 16], &device);

        let output = model.forward(prob, src, rec);
        let grads = (output.confidence.mean() + output.iou.mean()).backward();

        assert!(model.conf_head.weight.val().grad(&grads).is_some());
        assert!(model.iou_head.weight.val().grad(&grads).is_some());
    }

    #[test]
    fn iou_conf_net_rejects_empty_stage() {
        let device = Default::default();
        let result = IouConfNetConfig::new()
            .with_blocks(vec![2, 0])
            .init::<TestBackend>(&device);

        assert!(matches!(
            result,
            Err(ModelError::InvalidConfiguration { .. })
        ));
    }
}

use burn::prelude::*;

/// ImageNet per-channel mean (RGB).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation (RGB).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Normalize `[batch_size, 3, height, width]` images in `[0, 1]` with the
/// ImageNet statistics.
pub fn normalize_imagenet<B: Backend>(images: Tensor<B, 4>) -> Tensor<B, 4> {
    let device = images.device();
    let mean = Tensor::<B, 1>::from_floats(IMAGENET_MEAN, &device).reshape([1, 3, 1, 1]);
    let std = Tensor::<B, 1>::from_floats(IMAGENET_STD, &device).reshape([1, 3, 1, 1]);

    (images - mean) / std
}

/// Build `[3, height, width]` from interleaved RGB samples.
pub(crate) fn hwc_to_chw<B: Backend>(
    pixels: Vec<f32>,
    height: usize,
    width: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    Tensor::<B, 3>::from_data(TensorData::new(pixels, [height, width, 3]), device).permute([2, 0, 1])
}

//! Training samples for the IoU/confidence network.
//!
//! A phase is described by a JSON manifest `<root>/<phase>.json`, an array
//! of records whose paths are relative to `root`:
//!
//! ```json
//! [
//!   {
//!     "image_src": "src/000001.png",
//!     "image_rec": "rec/000001.png",
//!     "prob": "prob/000001.npy",
//!     "label_map": "label/000001.png",
//!     "iou": [63.5],
//!     "valid": [1.0]
//!   }
//! ]
//! ```
//!
//! `prob` holds a `[C, H, W]` float32 probability map and `label_map` a
//! single-channel train-id image. `iou` is on the 0-100 scale.

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};
use ndarray::Array3;
use ndarray_npy::read_npy;
use serde::{Deserialize, Serialize};

use crate::{
    cityscapes::open_image,
    error::{DatasetError, DatasetResult},
    normalize::{hwc_to_chw, normalize_imagenet},
};

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IouRecord {
    pub image_src: PathBuf,
    pub image_rec: PathBuf,
    pub prob: PathBuf,
    pub label_map: PathBuf,
    pub iou: Vec<f32>,
    pub valid: Vec<f32>,
}

/// A loaded training sample.
#[derive(Debug, Clone)]
pub struct IouItem {
    /// RGB in `[0, 1]`, interleaved `[H, W, 3]`.
    pub image_src: Vec<f32>,
    /// RGB in `[0, 1]`, interleaved `[H, W, 3]`.
    pub image_rec: Vec<f32>,
    /// `[C, H, W]`.
    pub prob: Vec<f32>,
    /// `[H, W]`.
    pub label_map: Vec<i64>,
    pub iou: Vec<f32>,
    pub valid: Vec<f32>,
    pub num_classes: usize,
    pub height: usize,
    pub width: usize,
}

#[derive(Debug, Clone)]
pub struct IouBatch<B: Backend> {
    /// `[batch_size, 3, height, width]`, ImageNet-normalized.
    pub image_src: Tensor<B, 4>,
    /// `[batch_size, 3, height, width]`, ImageNet-normalized.
    pub image_rec: Tensor<B, 4>,
    /// `[batch_size, num_classes, height, width]`.
    pub prob: Tensor<B, 4>,
    /// `[batch_size, height, width]`.
    pub label_map: Tensor<B, 3, Int>,
    /// `[batch_size, num_iou_outputs]`, 0-100.
    pub iou: Tensor<B, 2>,
    /// `[batch_size, num_iou_outputs]`.
    pub valid: Tensor<B, 2>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IouBatcher;

impl<B: Backend> Batcher<B, IouItem, IouBatch<B>> for IouBatcher {
    fn batch(&self, items: Vec<IouItem>, device: &B::Device) -> IouBatch<B> {
        let batch_size = items.len();
        let mut image_src = Vec::with_capacity(batch_size);
        let mut image_rec = Vec::with_capacity(batch_size);
        let mut prob = Vec::with_capacity(batch_size);
        let mut label_map = Vec::with_capacity(batch_size);
        let mut iou = Vec::with_capacity(batch_size);
        let mut valid = Vec::with_capacity(batch_size);

        for item in items {
            let [height, width] = [item.height, item.width];
            let num_targets = item.iou.len();

            image_src.push(hwc_to_chw::<B>(item.image_src, height, width, device));
            image_rec.push(hwc_to_chw::<B>(item.image_rec, height, width, device));
            prob.push(Tensor::<B, 3>::from_data(
                TensorData::new(item.prob, [item.num_classes, height, width]),
                device,
            ));
            label_map.push(Tensor::<B, 2, Int>::from_data(
                TensorData::new(item.label_map, [height, width]),
                device,
            ));
            iou.push(Tensor::<B, 1>::from_data(
                TensorData::new(item.iou, [num_targets]),
                device,
            ));
            valid.push(Tensor::<B, 1>::from_data(
                TensorData::new(item.valid, [num_targets]),
                device,
            ));
        }

        IouBatch {
            image_src: normalize_imagenet(Tensor::stack(image_src, 0)),
            image_rec: normalize_imagenet(Tensor::stack(image_rec, 0)),
            prob: Tensor::stack(prob, 0),
            label_map: Tensor::stack(label_map, 0),
            iou: Tensor::stack(iou, 0),
            valid: Tensor::stack(valid, 0),
        }
    }
}

/// Manifest-driven IoU/confidence dataset.
#[derive(Debug, Clone)]
pub struct IouDataset {
    root: PathBuf,
    manifest: PathBuf,
    records: Vec<IouRecord>,
}

impl IouDataset {
    /// Read `<root>/<phase>.json`.
    pub fn new(root: impl AsRef<Path>, phase: &str) -> DatasetResult<Self> {
        let root = root.as_ref().to_path_buf();
        let manifest = root.join(format!("{phase}.json"));

        let text = fs::read_to_string(&manifest).map_err(|source| {
            DatasetError::ManifestReadFailed {
                path: manifest.clone(),
                source,
            }
        })?;
        let records: Vec<IouRecord> =
            serde_json::from_str(&text).map_err(|source| DatasetError::ManifestParseFailed {
                path: manifest.clone(),
                source,
            })?;

        if records.is_empty() {
            return Err(DatasetError::NoSamples { path: manifest });
        }

        tracing::info!(count = records.len(), manifest = %manifest.display(), "loaded IoU manifest");
        Ok(Self {
            root,
            manifest,
            records,
        })
    }

    pub fn records(&self) -> &[IouRecord] {
        &self.records
    }

    /// Load record `index`, checking that all parts agree on their shape.
    pub fn load(&self, index: usize) -> DatasetResult<Option<IouItem>> {
        let Some(record) = self.records.get(index) else {
            return Ok(None);
        };

        let src_path = self.root.join(&record.image_src);
        let src = open_image(&src_path)?.to_rgb32f();
        let (width, height) = src.dimensions();
        let expected = vec![height as usize, width as usize];

        let rec_path = self.root.join(&record.image_rec);
        let rec = open_image(&rec_path)?.to_rgb32f();
        check_shape(&rec_path, &expected, &[rec.height() as usize, rec.width() as usize])?;

        let label_path = self.root.join(&record.label_map);
        let label = open_image(&label_path)?.to_luma8();
        check_shape(
            &label_path,
            &expected,
            &[label.height() as usize, label.width() as usize],
        )?;

        let prob_path = self.root.join(&record.prob);
        let prob: Array3<f32> = read_npy(&prob_path).map_err(|source| DatasetError::NpyReadFailed {
            path: prob_path.clone(),
            source,
        })?;
        let (num_classes, prob_h, prob_w) = prob.dim();
        check_shape(&prob_path, &expected, &[prob_h, prob_w])?;

        if record.iou.len() != record.valid.len() {
            return Err(DatasetError::ShapeMismatch {
                path: self.manifest.clone(),
                expected: vec![record.iou.len()],
                actual: vec![record.valid.len()],
            });
        }

        Ok(Some(IouItem {
            image_src: src.into_raw(),
            image_rec: rec.into_raw(),
            prob: prob.iter().copied().collect(),
            label_map: label.into_raw().into_iter().map(i64::from).collect(),
            iou: record.iou.clone(),
            valid: record.valid.clone(),
            num_classes,
            height: height as usize,
            width: width as usize,
        }))
    }
}

fn check_shape(path: &Path, expected: &[usize], actual: &[usize]) -> DatasetResult<()> {
    if expected == actual {
        return Ok(());
    }
    Err(DatasetError::ShapeMismatch {
        path: path.to_path_buf(),
        expected: expected.to_vec(),
        actual: actual.to_vec(),
    })
}

impl Dataset<IouItem> for IouDataset {
    fn get(&self, index: usize) -> Option<IouItem> {
        match self.load(index) {
            Ok(item) => item,
            Err(e) => {
                tracing::error!(index, error = %e, "failed to load IoU sample");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

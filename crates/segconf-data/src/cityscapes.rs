//! Cityscapes evaluation dataset.
//!
//! Expected layout under the dataset root:
//!
//! ```text
//! leftImg8bit/<phase>/<city>/<name>_leftImg8bit.png
//! gtFine/<phase>/<city>/<name>_gtFine_labelIds.png
//! ```
//!
//! Raw label ids are mapped to the 19 train ids at load time; ids outside
//! the task become [`IGNORE_LABEL`](segconf_metric::IGNORE_LABEL).

use std::path::{Path, PathBuf};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};
use image::imageops::FilterType;
use segconf_metric::remap_label_ids;
use walkdir::WalkDir;

use crate::{
    error::{DatasetError, DatasetResult},
    normalize::{hwc_to_chw, normalize_imagenet},
};

const IMAGE_DIR: &str = "leftImg8bit";
const LABEL_DIR: &str = "gtFine";
const IMAGE_SUFFIX: &str = "_leftImg8bit.png";
const LABEL_SUFFIX: &str = "_gtFine_labelIds.png";

/// One image with its remapped label map.
#[derive(Debug, Clone)]
pub struct CityscapesItem {
    /// RGB in `[0, 1]`, interleaved `[H, W, 3]`.
    pub image: Vec<f32>,
    /// Train ids, `[H, W]`.
    pub label: Vec<u8>,
    pub height: usize,
    pub width: usize,
    /// Image path relative to the dataset root.
    pub path: String,
    /// Label path relative to the dataset root.
    pub label_path: String,
}

/// A batch of normalized images and label maps.
#[derive(Debug, Clone)]
pub struct CityscapesBatch<B: Backend> {
    /// `[batch_size, 3, height, width]`, ImageNet-normalized.
    pub images: Tensor<B, 4>,
    /// `[batch_size, height, width]`.
    pub labels: Tensor<B, 3, Int>,
    pub paths: Vec<String>,
    pub label_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CityscapesBatcher;

impl<B: Backend> Batcher<B, CityscapesItem, CityscapesBatch<B>> for CityscapesBatcher {
    fn batch(&self, items: Vec<CityscapesItem>, device: &B::Device) -> CityscapesBatch<B> {
        let batch_size = items.len();
        let mut images = Vec::with_capacity(batch_size);
        let mut labels = Vec::with_capacity(batch_size);
        let mut paths = Vec::with_capacity(batch_size);
        let mut label_paths = Vec::with_capacity(batch_size);

        for item in items {
            images.push(hwc_to_chw::<B>(item.image, item.height, item.width, device));

            let label = item.label.into_iter().map(i64::from).collect::<Vec<_>>();
            labels.push(Tensor::<B, 2, Int>::from_data(
                TensorData::new(label, [item.height, item.width]),
                device,
            ));

            paths.push(item.path);
            label_paths.push(item.label_path);
        }

        CityscapesBatch {
            images: normalize_imagenet(Tensor::stack(images, 0)),
            labels: Tensor::stack(labels, 0),
            paths,
            label_paths,
        }
    }
}

/// Image/label pairs of one Cityscapes phase.
#[derive(Debug, Clone)]
pub struct CityscapesDataset {
    root: PathBuf,
    items: Vec<(String, String)>,
    resize: Option<[u32; 2]>,
}

impl CityscapesDataset {
    /// Discover all image/label pairs of `phase` (`train`, `val`, `test`).
    ///
    /// Images without a label file are skipped with a warning.
    pub fn new(root: impl AsRef<Path>, phase: &str) -> DatasetResult<Self> {
        let root = root.as_ref().to_path_buf();
        let image_root = root.join(IMAGE_DIR).join(phase);
        if !image_root.is_dir() {
            return Err(DatasetError::DirectoryNotFound { path: image_root });
        }

        let mut items = Vec::new();
        for entry in WalkDir::new(&image_root).sort_by_file_name() {
            let entry = entry.map_err(|source| DatasetError::DirectoryReadFailed {
                path: image_root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let image_path = entry.path();
            let relative = image_path
                .strip_prefix(&image_root)
                .unwrap_or(image_path)
                .to_str()
                .ok_or_else(|| DatasetError::InvalidUtf8Path {
                    path: image_path.to_path_buf(),
                })?
                .replace('\\', "/");
            let Some(base) = relative.strip_suffix(IMAGE_SUFFIX) else {
                continue;
            };

            let label_rel = format!("{LABEL_DIR}/{phase}/{base}{LABEL_SUFFIX}");
            if !root.join(&label_rel).is_file() {
                tracing::warn!(image = %image_path.display(), "no label map found, skipping");
                continue;
            }

            items.push((format!("{IMAGE_DIR}/{phase}/{relative}"), label_rel));
        }

        if items.is_empty() {
            return Err(DatasetError::NoSamples { path: image_root });
        }

        tracing::info!(count = items.len(), phase, root = %root.display(), "found Cityscapes samples");
        Ok(Self {
            root,
            items,
            resize: None,
        })
    }

    /// Resize every sample to `[height, width]`: bilinear for images,
    /// nearest for labels.
    pub fn with_resize(mut self, size: [u32; 2]) -> Self {
        self.resize = Some(size);
        self
    }

    /// Load item `index`, reporting why it failed.
    pub fn load(&self, index: usize) -> DatasetResult<Option<CityscapesItem>> {
        let Some((path, label_path)) = self.items.get(index) else {
            return Ok(None);
        };

        let image = open_image(&self.root.join(path))?;
        let label = open_image(&self.root.join(label_path))?;
        let (image, label) = match self.resize {
            Some([height, width]) => (
                image.resize_exact(width, height, FilterType::Triangle),
                label.resize_exact(width, height, FilterType::Nearest),
            ),
            None => (image, label),
        };

        let label = label.to_luma8();
        if label.dimensions() != (image.width(), image.height()) {
            return Err(DatasetError::ShapeMismatch {
                path: self.root.join(label_path),
                expected: vec![image.height() as usize, image.width() as usize],
                actual: vec![label.height() as usize, label.width() as usize],
            });
        }

        let height = image.height() as usize;
        let width = image.width() as usize;
        let mut label = label.into_raw();
        remap_label_ids(&mut label);

        Ok(Some(CityscapesItem {
            image: image.to_rgb32f().into_raw(),
            label,
            height,
            width,
            path: path.clone(),
            label_path: label_path.clone(),
        }))
    }
}

impl Dataset<CityscapesItem> for CityscapesDataset {
    fn get(&self, index: usize) -> Option<CityscapesItem> {
        match self.load(index) {
            Ok(item) => item,
            Err(e) => {
                tracing::error!(index, error = %e, "failed to load Cityscapes sample");
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

pub(crate) fn open_image(path: &Path) -> DatasetResult<image::DynamicImage> {
    image::open(path).map_err(|source| DatasetError::ImageOpenFailed {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::{GrayImage, RgbImage};
    use segconf_metric::IGNORE_LABEL;

    use super::*;
    use crate::tests::TestBackend;

    fn write_sample(root: &Path, phase: &str, city: &str, name: &str, raw_label: u8) {
        let image_dir = root.join(IMAGE_DIR).join(phase).join(city);
        let label_dir = root.join(LABEL_DIR).join(phase).join(city);
        fs::create_dir_all(&image_dir).unwrap();
        fs::create_dir_all(&label_dir).unwrap();

        RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 128]))
            .save(image_dir.join(format!("{name}{IMAGE_SUFFIX}")))
            .unwrap();
        GrayImage::from_pixel(4, 2, image::Luma([raw_label]))
            .save(label_dir.join(format!("{name}{LABEL_SUFFIX}")))
            .unwrap();
    }

    #[test]
    fn cityscapes_discovers_pairs_and_remaps_labels() {
        let dir = tempfile::tempdir().unwrap();
        write_sample(dir.path(), "val", "lindau", "lindau_000001_000019", 26);
        write_sample(dir.path(), "val", "frankfurt", "frankfurt_000000_000294", 3);

        let dataset = CityscapesDataset::new(dir.path(), "val").unwrap();
        assert_eq!(dataset.len(), 2);

        // Sorted by file name: frankfurt first.
        let item = dataset.get(0).unwrap();
        assert_eq!(
            item.path,
            "leftImg8bit/val/frankfurt/frankfurt_000000_000294_leftImg8bit.png"
        );
        assert_eq!(
            item.label_path,
            "gtFine/val/frankfurt/frankfurt_000000_000294_gtFine_labelIds.png"
        );
        assert!(item.label.iter().all(|&l| l == IGNORE_LABEL));

        // Raw id 26 (car) is train id 13.
        let item = dataset.get(1).unwrap();
        assert_eq!((item.height, item.width), (2, 4));
        assert!(item.label.iter().all(|&l| l == 13));
        assert_eq!(item.image.len(), 2 * 4 * 3);
    }

    #[test]
    fn cityscapes_skips_images_without_labels() {
        let dir = tempfile::tempdir().unwrap();
        write_sample(dir.path(), "val", "lindau", "a", 7);
        let orphan = dir.path().join(IMAGE_DIR).join("val").join("lindau");
        RgbImage::new(4, 2)
            .save(orphan.join(format!("b{IMAGE_SUFFIX}")))
            .unwrap();

        let dataset = CityscapesDataset::new(dir.path(), "val").unwrap();

        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn cityscapes_missing_phase_directory() {
        let dir = tempfile::tempdir().unwrap();

        let result = CityscapesDataset::new(dir.path(), "val");

        assert!(matches!(result, Err(DatasetError::DirectoryNotFound { .. })));
    }

    #[test]
    fn cityscapes_resize_applies_to_image_and_label() {
        let dir = tempfile::tempdir().unwrap();
        write_sample(dir.path(), "train", "aachen", "a", 7);

        let dataset = CityscapesDataset::new(dir.path(), "train")
            .unwrap()
            .with_resize([4, 8]);
        let item = dataset.get(0).unwrap();

        assert_eq!((item.height, item.width), (4, 8));
        assert_eq!(item.label.len(), 32);
        assert!(item.label.iter().all(|&l| l == 0));
    }

    #[test]
    fn cityscapes_batcher_stacks_items() {
        let device = Default::default();
        let item = CityscapesItem {
            image: vec![0.5; 2 * 3 * 3],
            label: vec![1, 2, 255, 0, 0, 0],
            height: 2,
            width: 3,
            path: "leftImg8bit/val/x.png".to_string(),
            label_path: "gtFine/val/x.png".to_string(),
        };

        let batch: CityscapesBatch<TestBackend> =
            CityscapesBatcher.batch(vec![item.clone(), item], &device);

        assert_eq!(batch.images.dims(), [2, 3, 2, 3]);
        assert_eq!(batch.labels.dims(), [2, 2, 3]);
        assert_eq!(batch.label_paths.len(), 2);
        let labels = batch.labels.into_data().to_vec::<i64>().unwrap();
        assert_eq!(&labels[..6], &[1, 2, 255, 0, 0, 0]);
    }
}

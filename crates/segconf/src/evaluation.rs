//! MC-dropout evaluation over a Cityscapes phase.
//!
//! For every image the driver runs the estimator, scores the arg-max
//! prediction against the remapped label map and persists:
//!
//! - `<eval_output_dir>/metrics_mcd_val/<stem>.json` (or
//!   `metrics_trainccv_mcd` for the `train` phase), a [`MetricRecord`].
//! - outside the `train` phase, the entropy map of the image as
//!   `<eval_output_dir>/<label_path with gtFine -> gtFinePred_mcdropout>.npz`
//!   under the key `confidence_map`.
//!
//! Histograms are reset per image; the merged histogram only feeds the
//! final summary.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use burn::{
    config::Config,
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};
use ndarray::Array2;
use ndarray_npy::NpzWriter;
use segconf_data::{CityscapesBatch, CityscapesBatcher, CityscapesDataset};
use segconf_metric::{
    fast_hist, nanmean, result_stats, ConfusionHistogram, MetricRecord, SegmentationStats,
};
use segconf_model::{load_weights, Fcn8sConfig, SegmentationNetwork};
use segconf_uncertainty::{McDropoutEstimator, McDropoutEstimatorConfig};

use crate::error::{SegconfError, SegconfResult};

const TRAIN_PHASE: &str = "train";
const TRAIN_METRICS_DIR: &str = "metrics_trainccv_mcd";
const VAL_METRICS_DIR: &str = "metrics_mcd_val";
const LABEL_DIR: &str = "gtFine";
const CONFIDENCE_DIR: &str = "gtFinePred_mcdropout";
const CONFIDENCE_KEY: &str = "confidence_map";
const CONFIG_FILE: &str = "eval_config.json";

/// Evaluation run configuration.
#[derive(Config, Debug)]
pub struct EvalConfig {
    /// Segmentation network weights (`.pth`, `.mpk` or `.bin`).
    pub model_path: String,
    /// Cityscapes root holding `leftImg8bit/` and `gtFine/`.
    pub data_root: String,
    pub eval_output_dir: String,
    #[config(default = "String::from(\"val\")")]
    pub phase: String,
    /// Network layout; `num_classes` also sizes the confusion histogram.
    #[config(default = "Fcn8sConfig::new()")]
    pub model: Fcn8sConfig,
    #[config(default = "McDropoutEstimatorConfig::new()")]
    pub estimator: McDropoutEstimatorConfig,
    /// `(pattern, replacement)` pairs applied to PyTorch parameter names.
    #[config(default = "Vec::new()")]
    pub key_remaps: Vec<(String, String)>,
    /// Optional `[height, width]` applied to every sample.
    #[config(default = "None")]
    pub resize: Option<[u32; 2]>,
}

impl EvalConfig {
    /// Loads an evaluation configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    /// Saves this configuration to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let config_str = serde_json::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    pub fn is_train_phase(&self) -> bool {
        self.phase == TRAIN_PHASE
    }

    /// Directory receiving the per-image metric records.
    pub fn metrics_dir(&self) -> PathBuf {
        let name = if self.is_train_phase() {
            TRAIN_METRICS_DIR
        } else {
            VAL_METRICS_DIR
        };
        Path::new(&self.eval_output_dir).join(name)
    }

    /// Where the entropy map for `label_path` (relative to the dataset
    /// root) is written.
    pub fn confidence_map_path(&self, label_path: &str) -> PathBuf {
        Path::new(&self.eval_output_dir).join(format!(
            "{}.npz",
            label_path.replace(LABEL_DIR, CONFIDENCE_DIR)
        ))
    }
}

/// Dataset-level view of a finished run.
#[derive(Debug, Clone)]
pub struct EvaluationSummary {
    pub images: usize,
    /// Mean over images of the per-image mIoU.
    pub mean_image_iou: f64,
    /// Statistics of the histogram merged over every image.
    pub overall: SegmentationStats,
}

/// Loads the segmentation network from `config.model_path` and evaluates it.
///
/// # Errors
///
/// Fails on invalid configuration, unreadable weights or data, and on any
/// artifact write.
pub fn run_evaluation<B: Backend>(config: &EvalConfig, device: B::Device) -> Result<EvaluationSummary> {
    tracing::info!(?device, model = %config.model_path, "initializing MC-dropout evaluation");

    let network = config.model.init::<B>(&device)?;
    let network = load_weights(
        network,
        Path::new(&config.model_path),
        &config.key_remaps,
        &device,
    )?;

    evaluate_network(config, &network, &device)
}

/// Evaluates an already constructed network.
///
/// Images are loaded one at a time in dataset order. The first sample that
/// cannot be read aborts the run.
///
/// # Errors
///
/// See [`run_evaluation`].
pub fn evaluate_network<B, N>(
    config: &EvalConfig,
    network: &N,
    device: &B::Device,
) -> Result<EvaluationSummary>
where
    B: Backend,
    N: SegmentationNetwork<B>,
{
    let estimator = config.estimator.init()?;

    let mut dataset = CityscapesDataset::new(&config.data_root, &config.phase)?;
    if let Some(size) = config.resize {
        dataset = dataset.with_resize(size);
    }

    let output_dir = Path::new(&config.eval_output_dir);
    create_dir(output_dir)?;
    config.save(output_dir.join(CONFIG_FILE))?;
    let metrics_dir = config.metrics_dir();
    create_dir(&metrics_dir)?;

    let num_classes = network.num_classes();
    let mut merged = ConfusionHistogram::zeros(num_classes);
    let mut image_ious = Vec::with_capacity(dataset.len());

    tracing::info!(
        images = dataset.len(),
        samples = estimator.samples(),
        phase = %config.phase,
        "starting evaluation"
    );

    for index in 0..dataset.len() {
        let Some(item) = dataset.load(index)? else {
            anyhow::bail!("sample {index} disappeared from the dataset");
        };
        let batch: CityscapesBatch<B> = CityscapesBatcher.batch(vec![item], device);
        let hist = evaluate_batch(config, &estimator, network, batch, &metrics_dir)?;
        image_ious.push(result_stats(&hist).mean_iou());
        merged.merge(&hist);
    }

    let summary = EvaluationSummary {
        images: image_ious.len(),
        mean_image_iou: nanmean(&image_ious),
        overall: result_stats(&merged),
    };
    tracing::info!(
        images = summary.images,
        mean_image_iou = summary.mean_image_iou,
        mean_iou = summary.overall.mean_iou(),
        fw_iou = summary.overall.fw_iou,
        pixel_acc = summary.overall.acc_overall,
        class_acc = summary.overall.mean_class_accuracy(),
        "evaluation finished"
    );

    Ok(summary)
}

fn evaluate_batch<B, N>(
    config: &EvalConfig,
    estimator: &McDropoutEstimator,
    network: &N,
    batch: CityscapesBatch<B>,
    metrics_dir: &Path,
) -> Result<ConfusionHistogram>
where
    B: Backend,
    N: SegmentationNetwork<B>,
{
    let CityscapesBatch {
        images,
        labels,
        paths,
        label_paths,
    } = batch;
    let (Some(path), Some(label_path)) = (paths.first(), label_paths.first()) else {
        anyhow::bail!("data loader produced an empty batch");
    };

    let estimate = estimator.estimate(network, images);

    let ground_truth = int_values(labels)?;
    let prediction = int_values(estimate.prediction)?;
    let hist = fast_hist(&ground_truth, &prediction, network.num_classes());
    let stats = result_stats(&hist);

    tracing::info!(
        path = %path,
        mean_iou = stats.mean_iou(),
        fw_iou = stats.fw_iou,
        pixel_acc = stats.acc_overall,
        class_acc = stats.mean_class_accuracy(),
        "evaluated image"
    );

    let confidence = float_values(estimate.class_confidence.narrow(0, 0, 1))?;
    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path.as_str());
    write_metrics(
        &metrics_dir.join(format!("{stem}.json")),
        &MetricRecord::new(stats, confidence),
    )?;

    if !config.is_train_phase() {
        write_confidence_map(
            &config.confidence_map_path(label_path),
            estimate.entropy_map,
        )?;
    }

    Ok(hist)
}

fn int_values<B: Backend, const D: usize>(tensor: Tensor<B, D, Int>) -> SegconfResult<Vec<i64>> {
    tensor
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| SegconfError::TensorReadFailed {
            reason: format!("{e:?}"),
        })
}

fn float_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> SegconfResult<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| SegconfError::TensorReadFailed {
            reason: format!("{e:?}"),
        })
}

fn create_dir(path: &Path) -> SegconfResult<()> {
    fs::create_dir_all(path).map_err(|source| SegconfError::DirectoryCreateFailed {
        path: path.to_path_buf(),
        source,
    })
}

fn write_metrics(path: &Path, record: &MetricRecord) -> SegconfResult<()> {
    let json = serde_json::to_string(record).map_err(|source| {
        SegconfError::MetricSerializeFailed {
            path: path.to_path_buf(),
            source,
        }
    })?;
    fs::write(path, json).map_err(|source| SegconfError::ArtifactWriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the first image of `entropy_map` (`[N, H, W]`) as a compressed NPZ.
fn write_confidence_map<B: Backend>(path: &Path, entropy_map: Tensor<B, 3>) -> SegconfResult<()> {
    let [_, height, width] = entropy_map.dims();
    let values = float_values(entropy_map.narrow(0, 0, 1))?;
    let map = Array2::from_shape_vec((height, width), values).map_err(|e| {
        SegconfError::TensorReadFailed {
            reason: e.to_string(),
        }
    })?;

    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    let file = fs::File::create(path).map_err(|source| SegconfError::ArtifactWriteFailed {
        path: path.to_path_buf(),
        source,
    })?;

    let npz_error = |source| SegconfError::NpzWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let mut npz = NpzWriter::new_compressed(file);
    npz.add_array(CONFIDENCE_KEY, &map).map_err(npz_error)?;
    npz.finish().map_err(npz_error)?;

    tracing::debug!(path = %path.display(), height, width, "wrote confidence map");
    Ok(())
}

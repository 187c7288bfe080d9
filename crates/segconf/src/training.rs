use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use burn::{
    config::Config,
    data::dataloader::DataLoaderBuilder,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use segconf_data::{IouBatch, IouBatcher, IouDataset, RepeatingLoader};
use segconf_loss::IouConfLossConfig;
use segconf_model::{IouConfNet, IouConfNetConfig};

use crate::error::{SegconfError, SegconfResult};

const CONFIG_FILE: &str = "config.json";

/// Training run configuration for the IoU/confidence network.
#[derive(Config)]
pub struct TrainConfig {
    /// Run name; checkpoints go to `<checkpoints_dir>/<name>/`.
    pub name: String,
    /// Root holding the `<phase>.json` manifest.
    pub data_root: String,
    #[config(default = "String::from(\"./checkpoints\")")]
    pub checkpoints_dir: String,
    #[config(default = "String::from(\"train\")")]
    pub phase: String,
    #[config(default = "IouConfNetConfig::new()")]
    pub model: IouConfNetConfig,
    #[config(default = "IouConfLossConfig::new()")]
    pub loss: IouConfLossConfig,
    #[config(default = "AdamConfig::new()")]
    pub optimizer: AdamConfig,
    #[config(default = 1e-4)]
    pub learning_rate: f64,
    /// Total optimizer steps.
    #[config(default = 100_000)]
    pub niter: usize,
    /// Checkpoint every `snapshot` steps.
    #[config(default = 5_000)]
    pub snapshot: usize,
    #[config(default = 10)]
    pub log_interval: usize,
    #[config(default = 1)]
    pub batch_size: usize,
    #[config(default = 1)]
    pub num_workers: usize,
}

impl TrainConfig {
    /// Loads a training configuration from a JSON file.
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

    pub fn run_dir(&self) -> PathBuf {
        Path::new(&self.checkpoints_dir).join(&self.name)
    }

    fn validate(&self) -> SegconfResult<()> {
        if self.snapshot == 0 || self.log_interval == 0 || self.batch_size == 0 {
            return Err(SegconfError::InvalidConfiguration {
                reason: format!(
                    "snapshot ({}), log_interval ({}) and batch_size ({}) must be positive",
                    self.snapshot, self.log_interval, self.batch_size
                ),
            });
        }
        Ok(())
    }
}

/// Moving window over the most recent loss values.
#[derive(Debug, Clone)]
pub struct LossWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl LossWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds `value`, evicting the oldest entry once full.
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}

impl Default for LossWindow {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub iterations: usize,
    pub checkpoints: Vec<PathBuf>,
    /// Smoothed losses over the last steps, if any step ran.
    pub iou_loss: Option<f64>,
    pub conf_loss: Option<f64>,
}

/// Trains the IoU/confidence network until `config.niter` steps are done.
///
/// The data loader restarts whenever it is exhausted, so the run may end in
/// the middle of a pass.
///
/// # Errors
///
/// Fails on invalid configuration, unreadable data and checkpoint writes.
pub fn run_training<B: AutodiffBackend>(config: &TrainConfig, device: B::Device) -> Result<TrainingSummary> {
    tracing::info!(?device, name = %config.name, "initializing IoU/confidence training");
    config.validate()?;

    let run_dir = config.run_dir();
    fs::create_dir_all(&run_dir).map_err(|source| SegconfError::DirectoryCreateFailed {
        path: run_dir.clone(),
        source,
    })?;
    config.save(run_dir.join(CONFIG_FILE))?;

    let mut model: IouConfNet<B> = config.model.init(&device)?;
    let mut optimizer = config.optimizer.init::<B, IouConfNet<B>>();
    let loss = config.loss.init();

    let dataset = IouDataset::new(&config.data_root, &config.phase)?;
    let loader = DataLoaderBuilder::<B, _, _>::new(IouBatcher)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .set_device(device.clone())
        .build(dataset);
    let loader = RepeatingLoader::new(loader)?;
    let mut batches = loader.iter();

    tracing::info!(
        niter = config.niter,
        snapshot = config.snapshot,
        learning_rate = config.learning_rate,
        batch_size = config.batch_size,
        "starting training"
    );

    let mut iou_window = LossWindow::default();
    let mut conf_window = LossWindow::default();
    let mut checkpoints = Vec::new();
    let mut iteration = 0;

    while iteration < config.niter {
        let Some(batch) = batches.next() else {
            anyhow::bail!("no training sample could be loaded");
        };
        let IouBatch {
            image_src,
            image_rec,
            prob,
            label_map,
            iou,
            valid,
        } = batch?;

        let output = model.forward(prob.clone(), image_src, image_rec);
        let losses = loss.forward(output.iou, output.confidence, iou, valid, prob, label_map);

        let iou_loss = losses.iou_loss.into_scalar().elem::<f64>();
        let conf_loss = losses.conf_loss.into_scalar().elem::<f64>();
        iou_window.push(iou_loss);
        conf_window.push(conf_loss);

        let grads = losses.total.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optimizer.step(config.learning_rate, model, grads);

        if iteration % config.log_interval == 0 {
            tracing::info!(
                iteration,
                epoch = batches.epoch(),
                iou_loss,
                conf_loss,
                iou_loss_avg = iou_window.mean(),
                conf_loss_avg = conf_window.mean(),
                "training step"
            );
        }
        iteration += 1;

        if iteration % config.snapshot == 0 {
            checkpoints.push(save_checkpoint(&model, &run_dir, iteration)?);
        }
    }

    tracing::info!(iterations = iteration, "optimization complete");
    Ok(TrainingSummary {
        iterations: iteration,
        checkpoints,
        iou_loss: iou_window.mean(),
        conf_loss: conf_window.mean(),
    })
}

/// Writes `<run_dir>/iter<iteration>.mpk`.
fn save_checkpoint<B: Backend>(
    model: &IouConfNet<B>,
    run_dir: &Path,
    iteration: usize,
) -> SegconfResult<PathBuf> {
    let stem = run_dir.join(format!("iter{iteration}"));
    let path = stem.with_extension("mpk");

    model
        .clone()
        .save_file(stem, &NamedMpkFileRecorder::<FullPrecisionSettings>::new())
        .map_err(|e| SegconfError::CheckpointSaveFailed {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    tracing::info!(iteration, path = %path.display(), "saved checkpoint");
    Ok(path)
}

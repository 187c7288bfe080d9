//! Loading network weights from disk.
//!
//! The format is picked from the file extension:
//!
//! | Extension      | Recorder                                     |
//! |----------------|----------------------------------------------|
//! | `.pt`, `.pth`  | `PyTorchFileRecorder` (feature `pytorch`)    |
//! | `.mpk`         | `NamedMpkFileRecorder<FullPrecisionSettings>` |
//! | `.bin`         | `BinFileRecorder<FullPrecisionSettings>`     |
//!
//! Checkpoints written during training use `.mpk`.

use std::path::Path;

#[cfg(feature = "pytorch")]
use burn::record::Recorder;
use burn::{
    prelude::*,
    record::{BinFileRecorder, FullPrecisionSettings, NamedMpkFileRecorder},
};
#[cfg(feature = "pytorch")]
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

use crate::error::{ModelError, ModelResult};

/// Supported weight file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightFormat {
    /// PyTorch `.pt` or `.pth` state dict.
    PyTorch,
    /// Burn named MessagePack `.mpk`.
    MessagePack,
    /// Burn binary `.bin`.
    Binary,
}

impl WeightFormat {
    /// Detect the format from the file extension.
    pub fn from_path(path: &Path) -> ModelResult<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("pt" | "pth") => Ok(Self::PyTorch),
            Some("mpk") => Ok(Self::MessagePack),
            Some("bin") => Ok(Self::Binary),
            _ => Err(ModelError::UnsupportedWeightFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Load `path` into `model`.
///
/// `key_remaps` are `(pattern, replacement)` regex pairs applied to PyTorch
/// parameter names before they are matched against the module tree; other
/// formats ignore them.
///
/// # Errors
///
/// Fails if the file is missing, its extension is unknown, or the recorder
/// cannot read or apply the record.
pub fn load_weights<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    key_remaps: &[(String, String)],
    device: &B::Device,
) -> ModelResult<M> {
    if !path.exists() {
        return Err(ModelError::WeightFileNotFound {
            path: path.to_path_buf(),
        });
    }

    let format = WeightFormat::from_path(path)?;
    tracing::info!(path = %path.display(), ?format, "loading weights");

    match format {
        WeightFormat::PyTorch => load_pytorch(model, path, key_remaps, device),
        WeightFormat::MessagePack => {
            let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
            model
                .load_file(path, &recorder, device)
                .map_err(|e| ModelError::WeightLoadingFailed {
                    path: path.to_path_buf(),
                    reason: format!("MessagePack loading failed: {}", e),
                })
        }
        WeightFormat::Binary => {
            let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
            model
                .load_file(path, &recorder, device)
                .map_err(|e| ModelError::WeightLoadingFailed {
                    path: path.to_path_buf(),
                    reason: format!("binary loading failed: {}", e),
                })
        }
    }
}

#[cfg(feature = "pytorch")]
fn load_pytorch<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    key_remaps: &[(String, String)],
    device: &B::Device,
) -> ModelResult<M> {
    let load_args = key_remaps.iter().fold(
        LoadArgs::new(path.to_path_buf()),
        |args, (pattern, replacement)| args.with_key_remap(pattern, replacement),
    );

    let record = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(load_args, device)
        .map_err(|e| ModelError::WeightLoadingFailed {
            path: path.to_path_buf(),
            reason: format!("PyTorch loading failed: {}", e),
        })?;

    Ok(model.load_record(record))
}

#[cfg(not(feature = "pytorch"))]
fn load_pytorch<B: Backend, M: Module<B>>(
    _model: M,
    path: &Path,
    _key_remaps: &[(String, String)],
    _device: &B::Device,
) -> ModelResult<M> {
    Err(ModelError::PyTorchSupportDisabled {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use burn::{
        module::Module,
        record::{FullPrecisionSettings, NamedMpkFileRecorder},
        tensor::{Distribution, Tolerance},
    };

    use super::*;
    use crate::{tests::TestBackend, Fcn8sConfig, InferenceMode};

    fn tiny_fcn() -> Fcn8sConfig {
        Fcn8sConfig::new()
            .with_num_classes(3)
            .with_fc_channels(8)
            .with_base_channels(2)
    }

    #[test]
    fn weight_format_from_extension() {
        assert_eq!(
            WeightFormat::from_path(Path::new("a/b.pth")).unwrap(),
            WeightFormat::PyTorch
        );
        assert_eq!(
            WeightFormat::from_path(Path::new("iter100.mpk")).unwrap(),
            WeightFormat::MessagePack
        );
        assert_eq!(
            WeightFormat::from_path(Path::new("w.bin")).unwrap(),
            WeightFormat::Binary
        );
        assert!(matches!(
            WeightFormat::from_path(Path::new("w.onnx")),
            Err(ModelError::UnsupportedWeightFormat { .. })
        ));
    }

    #[test]
    fn load_weights_reports_missing_file() {
        let device = Default::default();
        let model = tiny_fcn().init::<TestBackend>(&device).unwrap();

        let result = load_weights(model, &PathBuf::from("/nonexistent/iter1.mpk"), &[], &device);

        assert!(matches!(result, Err(ModelError::WeightFileNotFound { .. })));
    }

    #[test]
    fn load_weights_restores_messagepack_checkpoint() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let saved = tiny_fcn().init::<TestBackend>(&device).unwrap();
        let images =
            Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Normal(0.0, 1.0), &device);
        let expected = saved.forward(images.clone(), InferenceMode::Eval);

        let base = dir.path().join("iter2");
        saved
            .save_file(base.clone(), &NamedMpkFileRecorder::<FullPrecisionSettings>::new())
            .unwrap();

        let fresh = tiny_fcn().init::<TestBackend>(&device).unwrap();
        let loaded = load_weights(fresh, &base.with_extension("mpk"), &[], &device).unwrap();
        let actual = loaded.forward(images, InferenceMode::Eval);

        actual
            .into_data()
            .assert_approx_eq::<f32>(&expected.into_data(), Tolerance::default());
    }

    #[cfg(not(feature = "pytorch"))]
    #[test]
    fn load_weights_without_pytorch_feature() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fcn8s.pth");
        std::fs::write(&path, b"not a checkpoint").unwrap();
        let model = tiny_fcn().init::<TestBackend>(&device).unwrap();

        let result = load_weights(model, &path, &[], &device);

        assert!(matches!(
            result,
            Err(ModelError::PyTorchSupportDisabled { .. })
        ));
    }
}

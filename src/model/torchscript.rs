use std::{fs, path::Path};

use parking_lot::Mutex;
use serde::Deserialize;
use tch::{kind::Kind, CModule, Device, Tensor};

use super::Regressor;
use crate::error::{ModelError, StartupError};

#[derive(Deserialize)]
struct MetaJson {
    feat_list: Vec<String>,
}

/// TorchScript regressor taking `[1, n_features]` and returning one value.
pub struct TorchScriptRegressor {
    // CModule is Send but not Sync
    model: Mutex<CModule>,
    device: Device,
    feat_list: Vec<String>,
}

impl TorchScriptRegressor {
    pub fn load(model_path: &Path, meta_path: &Path) -> Result<Self, StartupError> {
        let device = Device::Cpu;

        let meta_txt = fs::read_to_string(meta_path).map_err(|source| StartupError::ModelMissing {
            path: meta_path.to_path_buf(),
            source,
        })?;
        let meta: MetaJson = serde_json::from_str(&meta_txt).map_err(|source| StartupError::ModelCorrupt {
            path: meta_path.to_path_buf(),
            source,
        })?;
        if meta.feat_list.is_empty() {
            return Err(StartupError::InvalidModel("meta feat_list is empty".into()));
        }

        if !model_path.exists() {
            return Err(StartupError::ModelMissing {
                path: model_path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        let model = CModule::load_on_device(model_path, device).map_err(|e| {
            StartupError::InvalidModel(format!("failed to load TorchScript {}: {}", model_path.display(), e))
        })?;

        Ok(Self {
            model: Mutex::new(model),
            device,
            feat_list: meta.feat_list,
        })
    }
}

/// Accepts `[1]`, `[1, 1]` or a scalar output.
fn single_value(out: &Tensor) -> Result<f64, ModelError> {
    let flat = out.to_kind(Kind::Double).reshape([-1]);
    if flat.size() != [1] {
        return Err(ModelError::Backend(format!("unexpected output shape: {:?}", out.size())));
    }
    Ok(flat.double_value(&[0]))
}

impl Regressor for TorchScriptRegressor {
    fn feature_names(&self) -> &[String] {
        &self.feat_list
    }

    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        let in_dim = self.feat_list.len();
        if x.len() != in_dim {
            return Err(ModelError::FeatureCount { expected: in_dim, got: x.len() });
        }

        let x32: Vec<f32> = x.iter().map(|v| *v as f32).collect();
        let input = Tensor::from_slice(&x32)
            .reshape([1, in_dim as i64])
            .to_device(self.device);

        let out = self
            .model
            .lock()
            .forward_ts(&[input])
            .map_err(|e| ModelError::Backend(e.to_string()))?;

        single_value(&out)
    }

    fn describe(&self) -> String {
        format!("TorchScript module (features={})", self.feat_list.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fire_predictor_ts_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_meta_file() {
        let dir = scratch_dir("no_meta");
        let err = TorchScriptRegressor::load(&dir.join("model.pt"), &dir.join("meta.json"))
            .err()
            .expect("load should fail");
        assert!(matches!(err, StartupError::ModelMissing { ref path, .. } if path.ends_with("meta.json")));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupt_meta_file() {
        let dir = scratch_dir("bad_meta");
        let meta = dir.join("meta.json");
        fs::write(&meta, "{ \"feat_list\": ").unwrap();
        let err = TorchScriptRegressor::load(&dir.join("model.pt"), &meta)
            .err()
            .expect("load should fail");
        assert!(matches!(err, StartupError::ModelCorrupt { .. }));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_feature_list() {
        let dir = scratch_dir("empty_meta");
        let meta = dir.join("meta.json");
        fs::write(&meta, r#"{ "feat_list": [] }"#).unwrap();
        let err = TorchScriptRegressor::load(&dir.join("model.pt"), &meta)
            .err()
            .expect("load should fail");
        assert!(matches!(err, StartupError::InvalidModel(_)));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_module_after_valid_meta() {
        let dir = scratch_dir("no_module");
        let meta = dir.join("meta.json");
        fs::write(&meta, r#"{ "feat_list": ["X", "Y"] }"#).unwrap();
        let err = TorchScriptRegressor::load(&dir.join("model.pt"), &meta)
            .err()
            .expect("load should fail");
        assert!(matches!(err, StartupError::ModelMissing { ref path, .. } if path.ends_with("model.pt")));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn output_must_hold_one_value() {
        let one = Tensor::from_slice(&[2.5f32]).reshape([1, 1]);
        assert_eq!(single_value(&one).unwrap(), 2.5);

        let two = Tensor::from_slice(&[1.0f32, 2.0]).reshape([1, 2]);
        assert!(matches!(single_value(&two), Err(ModelError::Backend(_))));
    }
}

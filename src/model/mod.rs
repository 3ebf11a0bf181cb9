use std::{path::Path, sync::Arc};

use crate::error::{ModelError, StartupError};
use crate::types::{PredictionInput, FIELDS};

mod trees;
#[cfg(feature = "torchscript")]
mod torchscript;

pub use trees::{GradientBoostedTrees, TreeNode};
#[cfg(feature = "torchscript")]
pub use torchscript::TorchScriptRegressor;

/// A trained model reduced to one call: ordered features in, one value out.
pub trait Regressor: Send + Sync {
    /// Column names in the order `predict` expects them.
    fn feature_names(&self) -> &[String];

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError>;

    /// Short label for logs.
    fn describe(&self) -> String {
        format!("regressor with {} features", self.feature_names().len())
    }
}

/// Where each model column comes from in the record, worked out once at load.
#[derive(Debug)]
struct ColumnLayout {
    /// Index into `PredictionInput::named_features` per model column.
    columns: Vec<usize>,
    missing: Vec<String>,
    unexpected: Vec<String>,
}

impl ColumnLayout {
    fn new(names: &[String]) -> Self {
        let mut columns = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match FIELDS.iter().position(|f| f.name == name.as_str()) {
                Some(i) => columns.push(i),
                None => missing.push(name.clone()),
            }
        }
        let unexpected = FIELDS
            .iter()
            .filter(|f| !names.iter().any(|n| n == f.name))
            .map(|f| f.name.to_string())
            .collect();
        Self { columns, missing, unexpected }
    }

    fn matches(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Shared, read-only handle to the loaded model.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<dyn Regressor>,
    layout: Arc<ColumnLayout>,
}

impl ModelHandle {
    pub fn new(regressor: impl Regressor + 'static) -> Self {
        let layout = ColumnLayout::new(regressor.feature_names());
        Self {
            inner: Arc::new(regressor),
            layout: Arc::new(layout),
        }
    }

    /// Load the artifact at `path`. The extension picks the backend:
    /// `.json` is a tree ensemble, `.pt` a TorchScript module whose feature
    /// list is read from `meta_path`.
    pub fn load(path: &Path, meta_path: Option<&Path>) -> Result<Self, StartupError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        match ext {
            "json" => Ok(Self::new(GradientBoostedTrees::load(path)?)),
            "pt" => Self::load_torchscript(path, meta_path),
            other => Err(StartupError::UnsupportedFormat(format!(
                "{} (extension {:?})",
                path.display(),
                other
            ))),
        }
    }

    #[cfg(feature = "torchscript")]
    fn load_torchscript(path: &Path, meta_path: Option<&Path>) -> Result<Self, StartupError> {
        let meta_path = meta_path.ok_or_else(|| {
            StartupError::Config("META_PATH is required for TorchScript models".into())
        })?;
        Ok(Self::new(TorchScriptRegressor::load(path, meta_path)?))
    }

    #[cfg(not(feature = "torchscript"))]
    fn load_torchscript(path: &Path, _meta_path: Option<&Path>) -> Result<Self, StartupError> {
        Err(StartupError::UnsupportedFormat(format!(
            "{} (built without the `torchscript` feature)",
            path.display()
        )))
    }

    pub fn feature_names(&self) -> &[String] {
        self.inner.feature_names()
    }

    pub fn describe(&self) -> String {
        self.inner.describe()
    }

    /// Model columns absent from the record, and record fields the model
    /// does not take. Both empty means the schemas agree.
    pub fn schema_diff(&self) -> (&[String], &[String]) {
        (&self.layout.missing, &self.layout.unexpected)
    }

    /// Reorder the record into the model's columns and run it.
    /// NaN or infinite inputs are rejected before the model sees them.
    pub fn predict(&self, record: &PredictionInput) -> Result<f64, ModelError> {
        if !self.layout.matches() {
            return Err(ModelError::SchemaMismatch {
                missing: self.layout.missing.clone(),
                unexpected: self.layout.unexpected.clone(),
            });
        }

        let named = record.named_features();
        let mut ordered = Vec::with_capacity(self.layout.columns.len());
        for &i in &self.layout.columns {
            let (name, value) = named[i];
            if !value.is_finite() {
                return Err(ModelError::NonFiniteInput { feature: name.to_string(), value });
            }
            ordered.push(value);
        }

        let y = self.inner.predict(&ordered)?;
        if !y.is_finite() {
            return Err(ModelError::NonFinite(y));
        }
        Ok(y)
    }

    /// One forward pass on zeros so a broken artifact fails before serving.
    pub fn warmup(&self) -> Result<f64, StartupError> {
        let zeros = vec![0.0; self.inner.feature_names().len()];
        self.inner.predict(&zeros).map_err(StartupError::Warmup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sums its inputs, in whatever column order it is given.
    struct Weighted {
        names: Vec<String>,
    }

    impl Regressor for Weighted {
        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
            // position-weighted so column order matters
            Ok(features.iter().enumerate().map(|(i, v)| (i + 1) as f64 * v).sum())
        }
    }

    fn record() -> PredictionInput {
        PredictionInput {
            x: 1, y: 2, month: 3, day: 4,
            ffmc: 5.0, dmc: 6.0, dc: 7.0, isi: 8.0,
            temp: 9.0, rh: 10, wind: 11.0, rain: 12.0,
        }
    }

    fn schema_names() -> Vec<String> {
        FIELDS.iter().map(|f| f.name.to_string()).collect()
    }

    #[test]
    fn reorders_by_feature_name() {
        let mut names = schema_names();
        names.reverse();
        let handle = ModelHandle::new(Weighted { names });
        // reversed: rain*1 + wind*2 + ... + X*12
        let expected: f64 = (1..=12).map(|i| (13 - i) as f64 * i as f64).sum();
        assert_eq!(handle.predict(&record()).unwrap(), expected);
    }

    #[test]
    fn missing_and_extra_columns_are_a_schema_mismatch() {
        let mut names = schema_names();
        names.retain(|n| n != "rain");
        names.push("area".into());
        let handle = ModelHandle::new(Weighted { names });
        match handle.predict(&record()) {
            Err(ModelError::SchemaMismatch { missing, unexpected }) => {
                assert_eq!(missing, vec!["area".to_string()]);
                assert_eq!(unexpected, vec!["rain".to_string()]);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn non_finite_output_is_a_model_error() {
        struct Nan(Vec<String>);
        impl Regressor for Nan {
            fn feature_names(&self) -> &[String] {
                &self.0
            }
            fn predict(&self, _: &[f64]) -> Result<f64, ModelError> {
                Ok(f64::NAN)
            }
        }
        let handle = ModelHandle::new(Nan(schema_names()));
        assert!(matches!(handle.predict(&record()), Err(ModelError::NonFinite(_))));
    }

    #[test]
    fn non_finite_input_never_reaches_the_model() {
        let handle = ModelHandle::new(Weighted { names: schema_names() });
        let mut rec = record();
        rec.temp = f64::NAN;
        match handle.predict(&rec) {
            Err(ModelError::NonFiniteInput { feature, .. }) => assert_eq!(feature, "temp"),
            other => panic!("expected non-finite input error, got {:?}", other),
        }
        rec.temp = 9.0;
        rec.rain = f64::INFINITY;
        assert!(matches!(handle.predict(&rec), Err(ModelError::NonFiniteInput { .. })));
    }

    #[test]
    fn schema_diff_is_computed_at_construction() {
        let mut names = schema_names();
        names.retain(|n| n != "X");
        let handle = ModelHandle::new(Weighted { names });
        let (missing, unexpected) = handle.schema_diff();
        assert!(missing.is_empty());
        assert_eq!(unexpected, ["X".to_string()]);
    }

    #[test]
    fn missing_artifact_fails_to_load() {
        let err = ModelHandle::load(Path::new("models/does_not_exist.json"), None)
            .err()
            .expect("load should fail");
        assert!(matches!(err, StartupError::ModelMissing { .. }));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = ModelHandle::load(Path::new("models/model.pkl"), None)
            .err()
            .expect("load should fail");
        assert!(matches!(err, StartupError::UnsupportedFormat(_)));
    }
}

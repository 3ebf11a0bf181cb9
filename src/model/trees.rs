use std::{collections::HashSet, fs, path::Path};

use serde::Deserialize;

use super::Regressor;
use crate::error::{ModelError, StartupError};

/// Regression tree node. Samples go left when `x[feature] <= threshold`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn eval(&self, x: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split { feature, threshold, left, right } => {
                    node = if x[*feature] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    fn validate(&self, n_features: usize, path: &mut Vec<&'static str>) -> Result<(), String> {
        match self {
            TreeNode::Leaf { value } => {
                if !value.is_finite() {
                    return Err(format!("non-finite leaf value at {}", path.join("/")));
                }
                Ok(())
            }
            TreeNode::Split { feature, threshold, left, right } => {
                if *feature >= n_features {
                    return Err(format!(
                        "split at {} uses feature {} but the model has {} features",
                        path.join("/"),
                        feature,
                        n_features
                    ));
                }
                if !threshold.is_finite() {
                    return Err(format!("non-finite threshold at {}", path.join("/")));
                }
                path.push("left");
                left.validate(n_features, path)?;
                path.pop();
                path.push("right");
                right.validate(n_features, path)?;
                path.pop();
                Ok(())
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Gradient-boosted regression trees:
/// `init + sum(learning_rate * tree(x))`.
#[derive(Debug, Clone, Deserialize)]
pub struct GradientBoostedTrees {
    pub feature_names: Vec<String>,
    pub init: f64,
    pub learning_rate: f64,
    pub trees: Vec<TreeNode>,
}

impl GradientBoostedTrees {
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let txt = fs::read_to_string(path).map_err(|source| StartupError::ModelMissing {
            path: path.to_path_buf(),
            source,
        })?;
        let model: Self = serde_json::from_str(&txt).map_err(|source| StartupError::ModelCorrupt {
            path: path.to_path_buf(),
            source,
        })?;
        model.validate().map_err(StartupError::InvalidModel)?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.feature_names.is_empty() {
            return Err("feature_names is empty".into());
        }
        let mut seen = HashSet::new();
        for name in &self.feature_names {
            if !seen.insert(name.as_str()) {
                return Err(format!("duplicate feature name {:?}", name));
            }
        }
        if !self.init.is_finite() || !self.learning_rate.is_finite() {
            return Err("init and learning_rate must be finite".into());
        }
        let n = self.feature_names.len();
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n, &mut vec!["root"])
                .map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }

    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(TreeNode::depth).max().unwrap_or(0)
    }
}

impl Regressor for GradientBoostedTrees {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.feature_names.len() {
            return Err(ModelError::FeatureCount {
                expected: self.feature_names.len(),
                got: features.len(),
            });
        }
        let mut y = self.init;
        for tree in &self.trees {
            y += self.learning_rate * tree.eval(features);
        }
        Ok(y)
    }

    fn describe(&self) -> String {
        format!(
            "gradient-boosted trees (features={}, trees={}, max_depth={}, learning_rate={})",
            self.feature_names.len(),
            self.trees.len(),
            self.max_depth(),
            self.learning_rate
        )
    }
}

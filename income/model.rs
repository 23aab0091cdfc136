use crate::features::{FEATURE_NAMES, FeatureRecord};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the public, human-readable format of a trained model
// when serialized to a TOML file. Models are fitted elsewhere and exported
// into this format; this crate only evaluates them.

/// One node of a regression tree, stored in a flat array.
///
/// A split sends a row to `left` when `row[feature] <= threshold` and to `right`
/// otherwise. Child indices always point further down the array than their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A single regression tree. The root is `nodes[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

/// The fitted estimator. The application never looks inside it beyond evaluating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    /// Bagged regression trees; the prediction is the mean over all trees.
    RandomForest { trees: Vec<RegressionTree> },
    /// `intercept + coefficients . row`
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
}

/// The top-level, self-contained, trained model artifact.
/// This is the structure that gets saved to and loaded from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Column names in the exact order the estimator was trained on.
    /// Split `feature` indices and linear coefficients refer to this order.
    pub feature_names: Vec<String>,
    pub estimator: Estimator,
}

/// Custom error type for model loading, saving, and prediction.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file '{}' was not found. Place the trained model at this path.", .path.display())]
    ArtifactNotFound { path: PathBuf },
    #[error("Failed to load model file '{}': {reason}", .path.display())]
    ArtifactCorrupt { path: PathBuf, reason: String },
    #[error(
        "The model expects {expected} features but the input row has {found} (missing: {}; unexpected: {}).",
        list_or_none(.missing),
        list_or_none(.unexpected)
    )]
    SchemaMismatch {
        expected: usize,
        found: usize,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    #[error("The model is not usable: {0}")]
    InvalidModel(String),
    #[error("Failed to write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

impl RegressionTree {
    /// Follows splits from the root until a leaf is reached. `None` when a split
    /// points outside the tree or the row, or does not move further down the array.
    fn evaluate(&self, row: ArrayView1<f64>) -> Option<f64> {
        let mut index = 0;
        loop {
            match self.nodes.get(index)? {
                TreeNode::Leaf { value } => return Some(*value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let next = if *row.get(*feature)? <= *threshold {
                        *left
                    } else {
                        *right
                    };
                    if next <= index {
                        return None;
                    }
                    index = next;
                }
            }
        }
    }

    fn validate(&self, num_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {i} has a non-finite value"));
                    }
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= num_features {
                        return Err(format!(
                            "node {i} splits on feature {feature}, but only {num_features} features are declared"
                        ));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {i} has a NaN threshold"));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!(
                                "node {i} points to child {child}, outside ({i}, {})",
                                self.nodes.len()
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl Estimator {
    fn evaluate(&self, row: ArrayView1<f64>) -> Result<f64, String> {
        match self {
            Estimator::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err("random forest has no trees".to_string());
                }
                let mut total = 0.0;
                for (t, tree) in trees.iter().enumerate() {
                    total += tree
                        .evaluate(row)
                        .ok_or_else(|| format!("tree {t} has a broken split"))?;
                }
                Ok(total / trees.len() as f64)
            }
            Estimator::Linear {
                intercept,
                coefficients,
            } => {
                if coefficients.len() != row.len() {
                    return Err(format!(
                        "linear model has {} coefficients for {} features",
                        coefficients.len(),
                        row.len()
                    ));
                }
                Ok(intercept + ArrayView1::from(coefficients.as_slice()).dot(&row))
            }
        }
    }

    fn validate(&self, num_features: usize) -> Result<(), String> {
        match self {
            Estimator::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err("random forest has no trees".to_string());
                }
                for (t, tree) in trees.iter().enumerate() {
                    tree.validate(num_features)
                        .map_err(|reason| format!("tree {t}: {reason}"))?;
                }
                Ok(())
            }
            Estimator::Linear {
                intercept,
                coefficients,
            } => {
                if coefficients.len() != num_features {
                    return Err(format!(
                        "linear model has {} coefficients for {num_features} features",
                        coefficients.len()
                    ));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("linear model has non-finite parameters".to_string());
                }
                Ok(())
            }
        }
    }

    /// Short human-readable description used in log output.
    pub fn describe(&self) -> String {
        match self {
            Estimator::RandomForest { trees } => format!("random forest with {} trees", trees.len()),
            Estimator::Linear { coefficients, .. } => {
                format!("linear model with {} coefficients", coefficients.len())
            }
        }
    }
}

impl TrainedModel {
    /// Predicts annual income for one feature row.
    ///
    /// The artifact's declared columns must be exactly the 13 derived feature names;
    /// any difference is reported as `ModelError::SchemaMismatch`. Column order in the
    /// artifact is free: values are gathered in the order the artifact declares.
    pub fn predict(&self, record: &FeatureRecord) -> Result<f64, ModelError> {
        self.check_schema()?;
        let row = record
            .to_array_in(&self.feature_names)
            .ok_or_else(|| self.schema_mismatch())?;
        self.estimator
            .evaluate(row.view())
            .map_err(ModelError::InvalidModel)
    }

    fn check_schema(&self) -> Result<(), ModelError> {
        let declared_exactly_once = FEATURE_NAMES.iter().all(|name| {
            self.feature_names.iter().filter(|n| n.as_str() == *name).count() == 1
        });
        if declared_exactly_once && self.feature_names.len() == FEATURE_NAMES.len() {
            Ok(())
        } else {
            Err(self.schema_mismatch())
        }
    }

    fn schema_mismatch(&self) -> ModelError {
        let missing = FEATURE_NAMES
            .iter()
            .filter(|name| !self.feature_names.iter().any(|n| n == *name))
            .map(|name| name.to_string())
            .collect();
        let unexpected = self
            .feature_names
            .iter()
            .filter(|n| !FEATURE_NAMES.contains(&n.as_str()))
            .cloned()
            .collect();
        ModelError::SchemaMismatch {
            expected: self.feature_names.len(),
            found: FEATURE_NAMES.len(),
            missing,
            unexpected,
        }
    }

    /// Checks the internal consistency of the estimator against the declared columns.
    pub fn validate(&self) -> Result<(), String> {
        if self.feature_names.is_empty() {
            return Err("model declares no features".to_string());
        }
        self.estimator.validate(self.feature_names.len())
    }

    /// Saves the trained model to a file in a human-readable TOML format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads a trained model from a TOML file.
    ///
    /// A missing file is `ArtifactNotFound`; anything that exists but cannot be read,
    /// parsed, or validated is `ArtifactCorrupt`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let corrupt = |reason: String| ModelError::ArtifactCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let toml_string = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ModelError::ArtifactNotFound {
                path: path.to_path_buf(),
            },
            _ => corrupt(e.to_string()),
        })?;
        let model: TrainedModel =
            toml::from_str(&toml_string).map_err(|e| corrupt(e.message().to_string()))?;
        model.validate().map_err(corrupt)?;

        log::info!(
            "Loaded {} over {} features from {}",
            model.estimator.describe(),
            model.feature_names.len(),
            path.display()
        );
        Ok(model)
    }
}

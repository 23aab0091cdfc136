//! # Prediction Session
//!
//! The long-lived context behind the form. The model artifact is loaded exactly once,
//! when the session starts, and is then only read. Each press of the predict action is
//! one call to [`PredictionSession::handle`], which runs the whole derive-then-predict
//! flow and turns every failure into a user-visible [`Outcome`] instead of an error
//! that could take the process down.
//!
//! A model that fails to load disables prediction for the rest of the session, but
//! the session itself stays alive so the failure can be shown to the user.

use crate::features::{FeatureError, derive};
use crate::model::{ModelError, TrainedModel};
use crate::survey::RespondentForm;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Shown under every successful estimate.
pub const ESTIMATE_NOTE: &str =
    "The model is most accurate near the middle of the income distribution.";

/// Shown under a schema mismatch, which almost always means the wrong artifact.
pub const SCHEMA_HINT: &str = "Make sure the model was trained on the same 13 features.";

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("The model produced a non-finite prediction ({0})")]
    NonFinite(f64),
}

/// What the form displays after one predict action.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A successful prediction, with its display formatting already applied.
    Estimate { amount: f64, formatted: String },
    /// The model could not be loaded; prediction is disabled for this session.
    Unavailable(String),
    /// This request failed, but the form can be corrected and resubmitted.
    Failed {
        message: String,
        hint: Option<&'static str>,
    },
}

impl Outcome {
    pub fn is_estimate(&self) -> bool {
        matches!(self, Outcome::Estimate { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Estimate { formatted, .. } => {
                writeln!(f, "Predicted annual income: {formatted}")?;
                write!(f, "{ESTIMATE_NOTE}")
            }
            Outcome::Unavailable(message) => write!(f, "Prediction unavailable: {message}"),
            Outcome::Failed { message, hint } => {
                write!(f, "Prediction failed: {message}")?;
                if let Some(hint) = hint {
                    write!(f, "\n{hint}")?;
                }
                Ok(())
            }
        }
    }
}

/// Formats an amount with thousands separators and two decimals, e.g. `$45,123.46`.
/// Negative amounts put the sign before the symbol.
pub fn format_currency(amount: f64, symbol: &str) -> String {
    if !amount.is_finite() {
        return format!("{symbol}{amount}");
    }
    let cents = (amount.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{symbol}{grouped}.{fraction:02}")
}

pub struct PredictionSession {
    model: Result<TrainedModel, ModelError>,
    currency_symbol: String,
}

impl PredictionSession {
    /// Loads the model artifact once. Load failures are kept, not returned.
    pub fn start(model_path: impl AsRef<Path>) -> Self {
        let model = TrainedModel::load(model_path.as_ref());
        if let Err(e) = &model {
            log::error!("Prediction disabled for this session: {e}");
        }
        Self {
            model,
            currency_symbol: "$".to_string(),
        }
    }

    /// A session around an already-built model, which must pass the same structural
    /// checks as a loaded artifact.
    pub fn from_model(model: TrainedModel) -> Result<Self, ModelError> {
        model.validate().map_err(ModelError::InvalidModel)?;
        Ok(Self {
            model: Ok(model),
            currency_symbol: "$".to_string(),
        })
    }

    pub fn with_currency_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.currency_symbol = symbol.into();
        self
    }

    /// The blocking load error, if the model could not be loaded.
    pub fn startup_error(&self) -> Option<&ModelError> {
        self.model.as_ref().err()
    }

    pub fn is_available(&self) -> bool {
        self.model.is_ok()
    }

    /// Derives features for `form` and runs the model on them.
    pub fn predict(&self, form: &RespondentForm) -> Result<f64, PredictionError> {
        let model = self
            .model
            .as_ref()
            .map_err(|e| PredictionError::Unavailable(e.to_string()))?;
        let record = derive(form)?;
        log::debug!("Derived features: {record:?}");
        let amount = model.predict(&record)?;
        if !amount.is_finite() {
            return Err(PredictionError::NonFinite(amount));
        }
        Ok(amount)
    }

    /// Handles one predict action from the form.
    pub fn handle(&self, form: &RespondentForm) -> Outcome {
        match self.predict(form) {
            Ok(amount) => {
                log::info!("Predicted annual income {amount:.2}");
                Outcome::Estimate {
                    amount,
                    formatted: format_currency(amount, &self.currency_symbol),
                }
            }
            Err(PredictionError::Unavailable(message)) => Outcome::Unavailable(message),
            Err(e) => {
                log::warn!("Prediction request failed: {e}");
                let hint = match &e {
                    PredictionError::Model(ModelError::SchemaMismatch { .. }) => Some(SCHEMA_HINT),
                    _ => None,
                };
                Outcome::Failed {
                    message: e.to_string(),
                    hint,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_NAMES;
    use crate::model::{Estimator, RegressionTree, TreeNode};

    fn constant_model(value: f64) -> TrainedModel {
        TrainedModel {
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            estimator: Estimator::RandomForest {
                trees: vec![RegressionTree {
                    nodes: vec![TreeNode::Leaf { value }],
                }],
            },
        }
    }

    #[test]
    fn currency_formatting_groups_thousands() {
        assert_eq!(format_currency(45123.456, "$"), "$45,123.46");
        assert_eq!(format_currency(999.999, "$"), "$1,000.00");
        assert_eq!(format_currency(0.0, "$"), "$0.00");
        assert_eq!(format_currency(1234567.0, "$"), "$1,234,567.00");
        assert_eq!(format_currency(100.0, "$"), "$100.00");
        assert_eq!(format_currency(-2500.5, "$"), "-$2,500.50");
        assert_eq!(format_currency(-0.001, "$"), "$0.00");
        assert_eq!(format_currency(12.0, "€"), "€12.00");
    }

    #[test]
    fn successful_request_displays_estimate_and_note() {
        let session = PredictionSession::from_model(constant_model(52_340.5)).unwrap();
        let outcome = session.handle(&RespondentForm::default());
        assert!(outcome.is_estimate());
        let text = outcome.to_string();
        assert!(text.starts_with("Predicted annual income: $52,340.50"));
        assert!(text.ends_with(ESTIMATE_NOTE));
    }

    #[test]
    fn missing_model_disables_prediction_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let session = PredictionSession::start(dir.path().join("random_forest_model.toml"));

        assert!(!session.is_available());
        assert!(matches!(
            session.startup_error(),
            Some(ModelError::ArtifactNotFound { .. })
        ));

        let outcome = session.handle(&RespondentForm::default());
        match &outcome {
            Outcome::Unavailable(message) => assert!(message.contains("not found")),
            other => panic!("Expected Unavailable, got {other:?}"),
        }
        // Every later request gets the same blocking message.
        assert_eq!(session.handle(&RespondentForm::default()), outcome);
    }

    #[test]
    fn schema_mismatch_fails_the_request_but_not_the_session() {
        let mut model = constant_model(1.0);
        model.feature_names[12] = "marital_Divorced".to_string();
        let session = PredictionSession::from_model(model).unwrap();

        let outcome = session.handle(&RespondentForm::default());
        match &outcome {
            Outcome::Failed { hint, .. } => assert_eq!(*hint, Some(SCHEMA_HINT)),
            other => panic!("Expected Failed, got {other:?}"),
        }
        assert!(outcome.to_string().contains(SCHEMA_HINT));
        assert!(session.is_available());
    }

    #[test]
    fn unknown_category_fails_the_request() {
        let session = PredictionSession::from_model(constant_model(1.0)).unwrap();
        let form = RespondentForm {
            marital: "Engaged".to_string(),
            ..RespondentForm::default()
        };
        match session.handle(&form) {
            Outcome::Failed { message, hint } => {
                assert!(message.contains("marital"));
                assert_eq!(hint, None);
            }
            other => panic!("Expected Failed, got {other:?}"),
        }
        assert!(session.handle(&RespondentForm::default()).is_estimate());
    }

    #[test]
    fn currency_symbol_is_configurable() {
        let session = PredictionSession::from_model(constant_model(1500.0))
            .unwrap()
            .with_currency_symbol("£");
        match session.handle(&RespondentForm::default()) {
            Outcome::Estimate { formatted, .. } => assert_eq!(formatted, "£1,500.00"),
            other => panic!("Expected Estimate, got {other:?}"),
        }
    }

    #[test]
    fn broken_models_are_rejected_when_the_session_is_built() {
        let empty_forest = TrainedModel {
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            estimator: Estimator::RandomForest { trees: vec![] },
        };
        assert!(matches!(
            PredictionSession::from_model(empty_forest),
            Err(ModelError::InvalidModel(_))
        ));

        let dangling = TrainedModel {
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            estimator: Estimator::RandomForest {
                trees: vec![RegressionTree {
                    nodes: vec![TreeNode::Split {
                        feature: 0,
                        threshold: 1.0,
                        left: 5,
                        right: 6,
                    }],
                }],
            },
        };
        assert!(PredictionSession::from_model(dangling).is_err());

        let short_linear = TrainedModel {
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            estimator: Estimator::Linear {
                intercept: 0.0,
                coefficients: vec![1.0; 3],
            },
        };
        assert!(PredictionSession::from_model(short_linear).is_err());
    }

    #[test]
    fn overflowing_prediction_fails_instead_of_showing_an_estimate() {
        let mut coefficients = vec![0.0; FEATURE_NAMES.len()];
        coefficients[7] = f64::MAX;
        coefficients[5] = f64::MAX;
        let model = TrainedModel {
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            estimator: Estimator::Linear {
                intercept: 0.0,
                coefficients,
            },
        };
        let session = PredictionSession::from_model(model).unwrap();
        match session.handle(&RespondentForm::default()) {
            Outcome::Failed { message, hint } => {
                assert!(message.contains("non-finite"), "{message}");
                assert_eq!(hint, None);
            }
            other => panic!("Expected Failed, got {other:?}"),
        }
    }
}

//! Logistic regression classifier exported as coefficients

use crate::error::{InferenceError, LoadError};
use crate::models::inference::Classifier;
use crate::types::prediction::PredictionResult;
use serde::{Deserialize, Serialize};

fn default_threshold() -> f64 {
    0.5
}

/// Standardization applied before the linear model: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Coefficients of a fitted logistic regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Decision threshold on the positive-class probability
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<StandardScaler>,
}

/// Logistic regression: `p = sigmoid(intercept + w . x)`
pub struct LogisticClassifier {
    name: String,
    params: LogisticParams,
}

impl LogisticClassifier {
    /// Validate parameters against the number of declared features
    pub fn new(
        name: impl Into<String>,
        params: LogisticParams,
        feature_count: usize,
    ) -> Result<Self, LoadError> {
        if params.coefficients.len() != feature_count {
            return Err(LoadError::Incompatible(format!(
                "{} coefficients for {} features",
                params.coefficients.len(),
                feature_count
            )));
        }

        if !params.intercept.is_finite() || params.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(LoadError::Incompatible(
                "coefficients must be finite".to_string(),
            ));
        }

        if !(params.threshold > 0.0 && params.threshold < 1.0) {
            return Err(LoadError::Incompatible(format!(
                "threshold {} outside (0, 1)",
                params.threshold
            )));
        }

        if let Some(scaler) = &params.scaler {
            if scaler.mean.len() != feature_count || scaler.scale.len() != feature_count {
                return Err(LoadError::Incompatible(
                    "scaler size does not match feature count".to_string(),
                ));
            }
            if scaler.scale.iter().any(|&s| s == 0.0 || !s.is_finite())
                || scaler.mean.iter().any(|m| !m.is_finite())
            {
                return Err(LoadError::Incompatible(
                    "scaler values must be finite and scale non-zero".to_string(),
                ));
            }
        }

        Ok(Self {
            name: name.into(),
            params,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.params.threshold
    }

    /// Decision function: intercept + sum(w_i * x_i) on scaled inputs
    fn decision_function(&self, features: &[f64]) -> f64 {
        let linear: f64 = match &self.params.scaler {
            Some(scaler) => features
                .iter()
                .zip(&self.params.coefficients)
                .zip(scaler.mean.iter().zip(&scaler.scale))
                .map(|((x, w), (mean, scale))| w * (x - mean) / scale)
                .sum(),
            None => features
                .iter()
                .zip(&self.params.coefficients)
                .map(|(x, w)| w * x)
                .sum(),
        };
        self.params.intercept + linear
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Classifier for LogisticClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, features: &[f64]) -> Result<PredictionResult, InferenceError> {
        if features.len() != self.params.coefficients.len() {
            return Err(InferenceError::model(
                &self.name,
                format!(
                    "expected {} features, got {}",
                    self.params.coefficients.len(),
                    features.len()
                ),
            ));
        }

        let probability = sigmoid(self.decision_function(features));
        if !probability.is_finite() {
            return Err(InferenceError::InvalidProbability {
                model: self.name.clone(),
                value: probability,
            });
        }

        let label = u8::from(probability >= self.params.threshold);
        Ok(PredictionResult::new(label, probability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> LogisticParams {
        LogisticParams {
            coefficients: vec![0.04, 0.1],
            intercept: -8.0,
            threshold: 0.5,
            scaler: None,
        }
    }

    #[test]
    fn test_high_glucose_is_positive() {
        let model = LogisticClassifier::new("logistic", params(), 2).unwrap();

        // z = -8 + 6 + 3 = 1
        let result = model.score(&[150.0, 30.0]).unwrap();
        assert_eq!(result.label, 1);
        assert!((result.probability - sigmoid(1.0)).abs() < 1e-12);

        // z = -8 + 3.2 + 2.2 = -2.6
        let result = model.score(&[80.0, 22.0]).unwrap();
        assert_eq!(result.label, 0);
        assert!(result.probability < 0.5);
    }

    #[test]
    fn test_scaler_is_applied() {
        let mut p = params();
        p.coefficients = vec![1.0, 1.0];
        p.intercept = 0.0;
        p.scaler = Some(StandardScaler {
            mean: vec![100.0, 25.0],
            scale: vec![50.0, 5.0],
        });
        let model = LogisticClassifier::new("scaled", p, 2).unwrap();

        let result = model.score(&[100.0, 25.0]).unwrap();
        assert!((result.probability - 0.5).abs() < 1e-12);
        assert_eq!(result.label, 1);
    }

    #[test]
    fn test_rejects_incompatible_params() {
        assert!(LogisticClassifier::new("bad", params(), 3).is_err());

        let mut p = params();
        p.threshold = 1.5;
        assert!(LogisticClassifier::new("bad", p, 2).is_err());

        let mut p = params();
        p.scaler = Some(StandardScaler {
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 0.0],
        });
        assert!(LogisticClassifier::new("bad", p, 2).is_err());
    }

    #[test]
    fn test_threshold_is_owned_by_model() {
        let mut p = params();
        p.threshold = 0.9;
        let model = LogisticClassifier::new("strict", p, 2).unwrap();

        let result = model.score(&[150.0, 30.0]).unwrap();
        assert!(result.probability > 0.5);
        assert_eq!(result.label, 0);
    }
}

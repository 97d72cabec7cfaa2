//! Prediction result and the advisory outcome shown for it

use serde::{Deserialize, Serialize};

/// Label and positive-class probability produced for one input record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 1 when the model flags the positive class, 0 otherwise
    pub label: u8,
    /// Positive-class probability (0.0 - 1.0)
    pub probability: f64,
}

impl PredictionResult {
    pub fn new(label: u8, probability: f64) -> Self {
        Self { label, probability }
    }

    pub fn is_positive(&self) -> bool {
        self.label == 1
    }

    /// Probability as a percentage
    pub fn percentage(&self) -> f64 {
        self.probability * 100.0
    }

    /// Percentage with two decimals, e.g. `82.00%`
    pub fn formatted_percentage(&self) -> String {
        format!("{:.2}%", self.percentage())
    }

    pub fn outcome(&self) -> Outcome {
        if self.is_positive() {
            Outcome::RiskDetected
        } else {
            Outcome::NoRiskDetected
        }
    }
}

/// The two mutually exclusive messages a prediction can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    RiskDetected,
    NoRiskDetected,
}

const PRECAUTIONS: [&str; 5] = [
    "Maintain a healthy diet low in sugar and refined carbs.",
    "Exercise regularly (at least 30 minutes/day).",
    "Monitor blood glucose levels regularly.",
    "Avoid smoking and excessive alcohol consumption.",
    "Visit your doctor for professional advice & treatment plans.",
];

const HEALTHY_LIFESTYLE: [&str; 1] =
    ["Keep following a healthy lifestyle to maintain your well-being."];

impl Outcome {
    pub fn headline(&self) -> &'static str {
        match self {
            Outcome::RiskDetected => "The model predicts that you may have diabetes.",
            Outcome::NoRiskDetected => {
                "The model predicts that you are unlikely to have diabetes."
            }
        }
    }

    /// Heading above the advisory block, if any
    pub fn advice_title(&self) -> Option<&'static str> {
        match self {
            Outcome::RiskDetected => Some("Precautions & Recommendations"),
            Outcome::NoRiskDetected => None,
        }
    }

    pub fn advice(&self) -> &'static [&'static str] {
        match self {
            Outcome::RiskDetected => &PRECAUTIONS,
            Outcome::NoRiskDetected => &HEALTHY_LIFESTYLE,
        }
    }
}

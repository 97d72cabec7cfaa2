//! Sample Model Writer
//!
//! Writes a logistic-regression model manifest over the Pima diabetes
//! features, so the service can run without an exported ONNX model.
//!
//! Usage: write-sample-model [output path]

use anyhow::{Context, Result};
use health_risk_predictor::models::loader::{ModelLoader, ModelManifest, ModelSpec};
use health_risk_predictor::models::logistic::{LogisticParams, StandardScaler};
use health_risk_predictor::{InputRecord, PredictionPipeline};
use std::path::PathBuf;
use tracing::info;

const FEATURES: [&str; 8] = [
    "Pregnancies",
    "Glucose",
    "BloodPressure",
    "SkinThickness",
    "Insulin",
    "BMI",
    "DiabetesPedigreeFunction",
    "Age",
];

/// Standardized-logistic fit on the Pima Indians diabetes dataset
fn sample_manifest() -> ModelManifest {
    ModelManifest {
        features: FEATURES.iter().map(|f| f.to_string()).collect(),
        target: "Outcome".to_string(),
        model: ModelSpec::Logistic(LogisticParams {
            coefficients: vec![0.41, 1.10, -0.25, 0.01, -0.14, 0.70, 0.31, 0.17],
            intercept: -0.86,
            threshold: 0.5,
            scaler: Some(StandardScaler {
                mean: vec![3.85, 120.89, 69.11, 20.54, 79.80, 31.99, 0.47, 33.24],
                scale: vec![3.37, 31.95, 19.34, 15.94, 115.17, 7.88, 0.33, 11.75],
            }),
        }),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("write_sample_model=info".parse()?)
                .add_directive("health_risk_predictor=info".parse()?),
        )
        .init();

    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("models/diabetes_model.json"));

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(&sample_manifest())?;
    std::fs::write(&output, json + "\n")
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(path = %output.display(), "Sample model manifest written");

    // Load it back and score two reference patients
    let model = ModelLoader::new(&output)
        .load()
        .context("Written manifest failed to load")?;
    let pipeline = PredictionPipeline::new(model);

    let patients = [
        ("high risk", [6.0, 148.0, 72.0, 35.0, 0.0, 33.6, 0.627, 50.0]),
        ("low risk", [1.0, 85.0, 66.0, 29.0, 0.0, 26.6, 0.351, 31.0]),
    ];

    for (label, values) in patients {
        let record: InputRecord = FEATURES.iter().copied().zip(values).collect();
        let result = pipeline.predict(&record)?;
        info!(
            patient = label,
            label = result.label,
            probability = %result.formatted_percentage(),
            "Reference prediction"
        );
    }

    Ok(())
}

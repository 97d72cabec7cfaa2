//! Error types for model loading, input validation and inference

use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain a usable model from the artifact. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model artifact not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read model artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model artifact {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("incompatible model artifact: {0}")]
    Incompatible(String),

    #[error("ONNX Runtime rejected model {}: {message}", path.display())]
    Runtime { path: PathBuf, message: String },
}

/// A submitted record that does not satisfy the feature schema or the form bounds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing value for {0}")]
    MissingFeature(String),

    #[error("unknown feature {0}")]
    UnknownFeature(String),

    #[error("{feature} is not a number: {value:?}")]
    NotANumber { feature: String, value: String },

    #[error("{0} must be a finite number")]
    NotFinite(String),

    #[error("{feature} must be between {min} and {max}, got {value}")]
    OutOfBounds {
        feature: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Failure inside the model's scoring call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("model {model} failed: {message}")]
    Model { model: String, message: String },

    #[error("model {model} returned an invalid probability {value}")]
    InvalidProbability { model: String, value: f64 },

    #[error("model {model} returned an invalid label {value}")]
    InvalidLabel { model: String, value: i64 },

    #[error("inference did not finish within {0} ms")]
    Timeout(u64),
}

impl InferenceError {
    pub fn model(model: impl Into<String>, message: impl ToString) -> Self {
        InferenceError::Model {
            model: model.into(),
            message: message.to_string(),
        }
    }
}

/// Error returned by the prediction pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

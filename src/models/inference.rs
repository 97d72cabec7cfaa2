//! Classifier interface and the ONNX Runtime backend

use crate::error::InferenceError;
use crate::types::prediction::PredictionResult;
use ort::memory::Allocator;
use ort::session::{Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::Mutex;
use tracing::debug;

/// A trained binary classifier.
///
/// Implementations own the decision threshold: the label they return is
/// never recomputed by callers.
pub trait Classifier: Send + Sync {
    /// Model name used in logs and errors
    fn name(&self) -> &str;

    /// Score one feature vector laid out in schema order
    fn score(&self, features: &[f64]) -> Result<PredictionResult, InferenceError>;
}

/// Where an ONNX model exposes its hard label
#[derive(Debug, Clone, PartialEq)]
pub enum LabelSource {
    /// Read the int64 label output produced by the model
    Output(String),
    /// The graph only emits probabilities; apply the threshold shipped with the artifact
    Threshold(f64),
}

/// Binary classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    name: String,
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    label: LabelSource,
    probability_output: String,
}

impl OnnxClassifier {
    pub fn new(
        name: impl Into<String>,
        session: Session,
        input_name: String,
        label: LabelSource,
        probability_output: String,
    ) -> Self {
        Self {
            name: name.into(),
            session: Mutex::new(session),
            input_name,
            label,
            probability_output,
        }
    }

    /// Extract the label from the model's label output
    fn extract_label(&self, outputs: &SessionOutputs, output_name: &str) -> Result<u8, InferenceError> {
        let output = outputs.get(output_name).ok_or_else(|| {
            InferenceError::model(&self.name, format!("missing output {output_name}"))
        })?;

        let (_, data) = output
            .try_extract_tensor::<i64>()
            .map_err(|e| InferenceError::model(&self.name, e))?;

        match data.first().copied() {
            Some(0) => Ok(0),
            Some(1) => Ok(1),
            Some(other) => Err(InferenceError::InvalidLabel {
                model: self.name.clone(),
                value: other,
            }),
            None => Err(InferenceError::model(&self.name, "empty label output")),
        }
    }

    /// Extract the positive-class probability.
    /// Handles tensor outputs and seq(map) outputs (sklearn ZipMap)
    fn extract_probability(&self, outputs: &SessionOutputs) -> Result<f64, InferenceError> {
        let output = outputs.get(&self.probability_output).ok_or_else(|| {
            InferenceError::model(
                &self.name,
                format!("missing output {}", self.probability_output),
            )
        })?;

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let prob = positive_class_from_tensor(&dims, data).ok_or_else(|| {
                InferenceError::model(&self.name, "empty probability tensor")
            })?;
            debug!(model = %self.name, prob = prob, "Extracted from tensor");
            return Ok(prob);
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            return self.extract_from_sequence_map(output);
        }

        Err(InferenceError::model(
            &self.name,
            format!("unsupported probability output type {dtype:?}"),
        ))
    }

    /// Extract probability from seq(map(int64, float)) format
    fn extract_from_sequence_map(&self, output: &DynValue) -> Result<f64, InferenceError> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| InferenceError::model(&self.name, e))?;

        let maps = sequence
            .try_extract_sequence::<DynMapValueType>(&allocator)
            .map_err(|e| InferenceError::model(&self.name, e))?;

        // batch size is always 1
        let map_value = maps
            .first()
            .ok_or_else(|| InferenceError::model(&self.name, "empty probability sequence"))?;

        let kv_pairs = map_value
            .try_extract_key_values::<i64, f32>()
            .map_err(|e| InferenceError::model(&self.name, e))?;

        if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 1) {
            debug!(model = %self.name, prob = *prob, "Extracted from seq(map)");
            return Ok(*prob as f64);
        }

        if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 0) {
            return Ok(1.0 - *prob as f64);
        }

        Err(InferenceError::model(&self.name, "no class probability in map"))
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, features: &[f64]) -> Result<PredictionResult, InferenceError> {
        // Prepare input tensor - shape [1, num_features]
        let input: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let shape = vec![1_i64, input.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, input)).map_err(|e| InferenceError::model(&self.name, e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::model(&self.name, format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(|e| InferenceError::model(&self.name, e))?;

        let probability = self.extract_probability(&outputs)?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(InferenceError::InvalidProbability {
                model: self.name.clone(),
                value: probability,
            });
        }

        let label = match &self.label {
            LabelSource::Output(name) => self.extract_label(&outputs, name)?,
            LabelSource::Threshold(threshold) => u8::from(probability >= *threshold),
        };

        Ok(PredictionResult::new(label, probability))
    }
}

/// Positive-class probability from a `[batch, classes]` or `[classes]` tensor
fn positive_class_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
    let num_classes = dims.last().copied().unwrap_or(0);
    if num_classes >= 2 {
        data.get(1).map(|&v| v as f64)
    } else {
        data.first().map(|&v| v as f64)
    }
}

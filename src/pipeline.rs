//! Prediction pipeline: one input record in, one label/probability out.
//!
//! Values are laid out in schema order and handed to the loaded classifier.
//! The label comes from the classifier's own threshold and is never
//! recomputed here.

use crate::error::{InferenceError, PredictError};
use crate::models::loader::LoadedModel;
use crate::types::prediction::PredictionResult;
use crate::types::record::{FeatureSchema, InputRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Scores input records against the shared, immutable model
#[derive(Debug, Clone)]
pub struct PredictionPipeline {
    model: Arc<LoadedModel>,
}

impl PredictionPipeline {
    pub fn new(model: Arc<LoadedModel>) -> Self {
        Self { model }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.model.schema
    }

    pub fn target(&self) -> &str {
        &self.model.target
    }

    pub fn model_name(&self) -> &str {
        self.model.classifier.name()
    }

    pub fn model(&self) -> &Arc<LoadedModel> {
        &self.model
    }

    /// Score one record.
    ///
    /// The record must carry exactly the schema's features with finite values;
    /// otherwise the whole record is rejected.
    pub fn predict(&self, record: &InputRecord) -> Result<PredictionResult, PredictError> {
        let features = record.to_vector(self.schema())?;
        let result = self.model.classifier.score(&features)?;

        if !(0.0..=1.0).contains(&result.probability) {
            return Err(InferenceError::InvalidProbability {
                model: self.model_name().to_string(),
                value: result.probability,
            }
            .into());
        }
        if result.label > 1 {
            return Err(InferenceError::InvalidLabel {
                model: self.model_name().to_string(),
                value: i64::from(result.label),
            }
            .into());
        }

        debug!(
            model = %self.model_name(),
            label = result.label,
            probability = result.probability,
            "Prediction complete"
        );

        Ok(result)
    }

    /// Score one record on a blocking thread, giving up after `timeout`
    pub async fn predict_with_timeout(
        &self,
        record: InputRecord,
        timeout: Duration,
    ) -> Result<PredictionResult, PredictError> {
        let pipeline = self.clone();
        run_blocking(timeout, self.model_name(), move || pipeline.predict(&record))
            .await
            .and_then(|r| r)
    }
}

/// Run `task` on the blocking pool with an upper bound on its duration
pub async fn run_blocking<T, F>(timeout: Duration, model: &str, task: F) -> Result<T, PredictError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(task);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => Err(InferenceError::model(model, join_error).into()),
        Err(_) => Err(InferenceError::Timeout(timeout.as_millis() as u64).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::models::inference::tests::{FailingClassifier, StubClassifier};
    use crate::models::inference::Classifier;

    fn pipeline_with(classifier: Box<dyn Classifier>) -> PredictionPipeline {
        let schema = FeatureSchema::new(vec!["Glucose".to_string(), "BMI".to_string()]).unwrap();
        PredictionPipeline::new(Arc::new(LoadedModel::new(classifier, schema, "Outcome")))
    }

    fn stub(probability: f64) -> PredictionPipeline {
        pipeline_with(Box::new(StubClassifier {
            probability,
            threshold: 0.5,
        }))
    }

    #[test]
    fn test_positive_prediction() {
        let record = InputRecord::new().with("Glucose", 150.0).with("BMI", 30.0);
        let result = stub(0.82).predict(&record).unwrap();

        assert_eq!(result, PredictionResult::new(1, 0.82));
        assert_eq!(result.formatted_percentage(), "82.00%");
    }

    #[test]
    fn test_negative_prediction() {
        let record = InputRecord::new().with("Glucose", 80.0).with("BMI", 22.0);
        let result = stub(0.10).predict(&record).unwrap();

        assert_eq!(result, PredictionResult::new(0, 0.10));
        assert_eq!(result.formatted_percentage(), "10.00%");
    }

    #[test]
    fn test_prediction_is_idempotent() {
        let pipeline = stub(0.82);
        let record = InputRecord::new().with("Glucose", 150.0).with("BMI", 30.0);

        let first = pipeline.predict(&record).unwrap();
        let second = pipeline.predict(&record).unwrap();
        assert_eq!(first.label, second.label);
        assert_eq!(first.probability.to_bits(), second.probability.to_bits());
    }

    #[test]
    fn test_missing_feature_is_a_validation_error() {
        let record = InputRecord::new().with("Glucose", 150.0);
        assert_eq!(
            stub(0.82).predict(&record),
            Err(PredictError::Validation(ValidationError::MissingFeature(
                "BMI".to_string()
            )))
        );
    }

    #[test]
    fn test_inference_error_is_surfaced() {
        let pipeline = pipeline_with(Box::new(FailingClassifier));
        let record = InputRecord::new().with("Glucose", 150.0).with("BMI", 30.0);
        assert!(matches!(
            pipeline.predict(&record),
            Err(PredictError::Inference(InferenceError::Model { .. }))
        ));
    }

    #[test]
    fn test_out_of_range_probability_is_rejected() {
        let record = InputRecord::new().with("Glucose", 150.0).with("BMI", 30.0);
        assert!(matches!(
            stub(1.5).predict(&record),
            Err(PredictError::Inference(InferenceError::InvalidProbability { .. }))
        ));
    }

    #[test]
    fn test_label_matches_threshold_across_range() {
        let record = InputRecord::new().with("Glucose", 100.0).with("BMI", 25.0);
        for p in [0.0, 0.25, 0.4999, 0.5, 0.75, 1.0] {
            let result = stub(p).predict(&record).unwrap();
            assert!((0.0..=1.0).contains(&result.probability));
            assert_eq!(result.label == 1, p >= 0.5, "probability {p}");
        }
    }

    #[tokio::test]
    async fn test_predict_with_timeout() {
        let record = InputRecord::new().with("Glucose", 150.0).with("BMI", 30.0);
        let result = stub(0.82)
            .predict_with_timeout(record, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.label, 1);
    }

    #[tokio::test]
    async fn test_run_blocking_times_out() {
        let result = run_blocking(Duration::from_millis(10), "slow", || {
            std::thread::sleep(Duration::from_millis(200));
        })
        .await;
        assert_eq!(result, Err(PredictError::Inference(InferenceError::Timeout(10))));
    }
}

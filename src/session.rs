//! Session state machine for the name gate and the prediction form.
//!
//! Each user action is one [`Event`]. [`SessionState::handle`] maps the
//! current state and the event to the next state and the [`View`] to render,
//! with no other effect.

use crate::error::{InferenceError, PredictError, ValidationError};
use crate::form::{FieldSpec, FormPolicy};
use crate::pipeline::PredictionPipeline;
use crate::types::prediction::PredictionResult;
use std::collections::HashMap;

pub const BLANK_NAME_WARNING: &str = "Please enter a valid name before proceeding.";

/// Which screen the session is on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    AwaitingName,
    AwaitingInput,
}

/// Transient per-session state, never persisted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub username: Option<String>,
    pub stage: Stage,
}

/// One discrete user action
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Re-render the current screen
    Show,
    SubmitName(String),
    /// Raw form values keyed by feature name
    Predict(HashMap<String, String>),
    Reset,
}

/// Result of the latest form submission
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    None,
    Scored(PredictionResult),
    Rejected(ValidationError),
    Failed(InferenceError),
}

impl From<Result<PredictionResult, PredictError>> for Submission {
    fn from(result: Result<PredictionResult, PredictError>) -> Self {
        match result {
            Ok(prediction) => Submission::Scored(prediction),
            Err(PredictError::Validation(e)) => Submission::Rejected(e),
            Err(PredictError::Inference(e)) => Submission::Failed(e),
        }
    }
}

/// What one transition asks the renderer to show
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    NameGate {
        warning: Option<String>,
    },
    Form {
        username: String,
        fields: Vec<FieldSpec>,
        /// Values the user last submitted, shown back in the inputs
        values: HashMap<String, String>,
        submission: Submission,
    },
}

impl View {
    pub fn submission(&self) -> Option<&Submission> {
        match self {
            View::Form { submission, .. } => Some(submission),
            View::NameGate { .. } => None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event
    pub fn handle(
        self,
        event: Event,
        pipeline: &PredictionPipeline,
        policy: &FormPolicy,
    ) -> (SessionState, View) {
        match (self.stage, event) {
            (Stage::AwaitingName, Event::SubmitName(name)) => {
                let name = name.trim();
                if name.is_empty() {
                    let view = View::NameGate {
                        warning: Some(BLANK_NAME_WARNING.to_string()),
                    };
                    return (self, view);
                }

                let next = SessionState {
                    username: Some(name.to_string()),
                    stage: Stage::AwaitingInput,
                };
                let view = next.form_view(pipeline, policy, HashMap::new(), Submission::None);
                (next, view)
            }
            (Stage::AwaitingInput, Event::Predict(raw)) => {
                let submission = match policy.parse(pipeline.schema(), &raw) {
                    Ok(record) => Submission::from(pipeline.predict(&record)),
                    Err(e) => Submission::Rejected(e),
                };
                let view = self.form_view(pipeline, policy, raw, submission);
                (self, view)
            }
            (_, Event::Reset) => (SessionState::new(), View::NameGate { warning: None }),
            (_, _) => {
                let view = self.current_view(pipeline, policy);
                (self, view)
            }
        }
    }

    /// The screen for the current stage with nothing submitted
    pub fn current_view(&self, pipeline: &PredictionPipeline, policy: &FormPolicy) -> View {
        match self.stage {
            Stage::AwaitingName => View::NameGate { warning: None },
            Stage::AwaitingInput => {
                self.form_view(pipeline, policy, HashMap::new(), Submission::None)
            }
        }
    }

    /// The form screen showing `submission`
    pub fn form_view(
        &self,
        pipeline: &PredictionPipeline,
        policy: &FormPolicy,
        values: HashMap<String, String>,
        submission: Submission,
    ) -> View {
        View::Form {
            username: self.username.clone().unwrap_or_default(),
            fields: policy.fields(pipeline.schema()),
            values,
            submission,
        }
    }
}

//! Health Risk Predictor Library
//!
//! An interactive form that collects numeric health measurements, scores
//! them with a pre-trained binary classifier and shows the positive-class
//! probability with advice for the predicted outcome.

pub mod config;
pub mod error;
pub mod form;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod session;
pub mod types;

pub use config::AppConfig;
pub use error::{InferenceError, LoadError, PredictError, ValidationError};
pub use form::FormPolicy;
pub use models::loader::{LoadedModel, ModelLoader};
pub use pipeline::PredictionPipeline;
pub use session::{Event, SessionState, Stage, View};
pub use types::{FeatureSchema, InputRecord, PredictionResult};

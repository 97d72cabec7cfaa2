//! Type definitions shared by the loader, pipeline and front end

pub mod prediction;
pub mod record;

pub use prediction::{Outcome, PredictionResult};
pub use record::{FeatureSchema, InputRecord};

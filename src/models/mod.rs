//! Model loading and inference backends

pub mod inference;
pub mod loader;
pub mod logistic;

pub use inference::{Classifier, OnnxClassifier};
pub use loader::{LoadedModel, ModelLoader, ModelManifest, ModelSpec};
pub use logistic::LogisticClassifier;

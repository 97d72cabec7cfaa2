//! Model artifact loader

use crate::config::ModelsConfig;
use crate::error::LoadError;
use crate::models::inference::{Classifier, LabelSource, OnnxClassifier};
use crate::models::logistic::{LogisticClassifier, LogisticParams};
use crate::types::record::FeatureSchema;
use once_cell::sync::OnceCell;
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// JSON manifest describing a trained model and its feature contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    /// Feature names in the order the model expects them
    pub features: Vec<String>,
    /// Name of the predicted column
    pub target: String,
    pub model: ModelSpec,
}

/// Model backend stored in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelSpec {
    Onnx(OnnxSpec),
    Logistic(LogisticParams),
}

/// ONNX model file plus optional output names
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnnxSpec {
    /// Model file, relative to the manifest directory
    pub path: PathBuf,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub label_output: Option<String>,
    #[serde(default)]
    pub probability_output: Option<String>,
    /// Only used when the graph has no label output
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// A loaded classifier together with its feature contract
pub struct LoadedModel {
    pub classifier: Box<dyn Classifier>,
    pub schema: FeatureSchema,
    pub target: String,
}

impl LoadedModel {
    pub fn new(classifier: Box<dyn Classifier>, schema: FeatureSchema, target: impl Into<String>) -> Self {
        Self {
            classifier,
            schema,
            target: target.into(),
        }
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("classifier", &self.classifier.name())
            .field("schema", &self.schema)
            .field("target", &self.target)
            .finish()
    }
}

/// Loads the model artifact once and hands out the cached instance afterwards
pub struct ModelLoader {
    manifest_path: PathBuf,
    /// Number of threads for ONNX inference
    onnx_threads: usize,
    cached: OnceCell<Arc<LoadedModel>>,
}

impl ModelLoader {
    /// Create a loader with default settings (1 thread)
    pub fn new<P: AsRef<Path>>(manifest_path: P) -> Self {
        Self::with_threads(manifest_path, 1)
    }

    /// Create a loader with the specified number of ONNX threads
    pub fn with_threads<P: AsRef<Path>>(manifest_path: P, onnx_threads: usize) -> Self {
        Self {
            manifest_path: manifest_path.as_ref().to_path_buf(),
            onnx_threads: onnx_threads.max(1),
            cached: OnceCell::new(),
        }
    }

    pub fn from_config(config: &ModelsConfig) -> Self {
        Self::with_threads(&config.manifest_path, config.onnx_threads)
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Load the model, reading the artifact only on the first call.
    ///
    /// Every later call returns the same `Arc`. A failed load is not cached.
    pub fn load(&self) -> Result<Arc<LoadedModel>, LoadError> {
        self.cached
            .get_or_try_init(|| self.load_uncached().map(Arc::new))
            .cloned()
    }

    fn load_uncached(&self) -> Result<LoadedModel, LoadError> {
        let manifest = self.read_manifest()?;
        let schema = FeatureSchema::new(manifest.features)?;

        if manifest.target.trim().is_empty() {
            return Err(LoadError::Incompatible("target name is empty".to_string()));
        }

        let base_dir = self
            .manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let classifier: Box<dyn Classifier> = match manifest.model {
            ModelSpec::Logistic(params) => {
                Box::new(LogisticClassifier::new("logistic", params, schema.len())?)
            }
            ModelSpec::Onnx(spec) => Box::new(self.load_onnx(&spec, &base_dir)?),
        };

        info!(
            model = %classifier.name(),
            features = schema.len(),
            target = %manifest.target,
            "Model loaded successfully"
        );

        Ok(LoadedModel::new(classifier, schema, manifest.target))
    }

    /// Read and parse the JSON manifest
    pub fn read_manifest(&self) -> Result<ModelManifest, LoadError> {
        let path = &self.manifest_path;
        info!(path = %path.display(), "Reading model manifest");

        if !path.exists() {
            return Err(LoadError::Missing(path.clone()));
        }

        let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;

        serde_json::from_str(&raw).map_err(|source| LoadError::Malformed {
            path: path.clone(),
            source,
        })
    }

    /// Load an ONNX model and resolve its input/output names
    fn load_onnx(&self, spec: &OnnxSpec, base_dir: &Path) -> Result<OnnxClassifier, LoadError> {
        let path = if spec.path.is_absolute() {
            spec.path.clone()
        } else {
            base_dir.join(&spec.path)
        };

        if !path.exists() {
            return Err(LoadError::Missing(path));
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx")
            .to_string();

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()
            .map_err(|e| runtime_error(&path, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| runtime_error(&path, e))?
            .with_intra_threads(self.onnx_threads)
            .map_err(|e| runtime_error(&path, e))?
            .commit_from_file(&path)
            .map_err(|e| runtime_error(&path, e))?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        let input_name = match &spec.input {
            Some(name) if input_names.contains(name) => name.clone(),
            Some(name) => {
                return Err(LoadError::Incompatible(format!(
                    "model has no input named {name}"
                )))
            }
            None => input_names.first().cloned().ok_or_else(|| {
                LoadError::Incompatible("model declares no inputs".to_string())
            })?,
        };

        let probability_output = resolve_output(
            spec.probability_output.as_deref(),
            &output_names,
            |name| name.contains("prob"),
        )?
        .ok_or_else(|| LoadError::Incompatible("model has no probability output".to_string()))?;

        let label = match resolve_output(spec.label_output.as_deref(), &output_names, |name| {
            name.contains("label")
        })? {
            Some(name) => LabelSource::Output(name),
            None => match spec.threshold {
                Some(t) if t > 0.0 && t < 1.0 => LabelSource::Threshold(t),
                _ => {
                    return Err(LoadError::Incompatible(
                        "model has no label output and no threshold".to_string(),
                    ))
                }
            },
        };

        info!(
            model = %name,
            input = %input_name,
            output = %probability_output,
            label = ?label,
            "ONNX model ready"
        );

        Ok(OnnxClassifier::new(
            name,
            session,
            input_name,
            label,
            probability_output,
        ))
    }
}

fn runtime_error(path: &Path, err: impl std::fmt::Display) -> LoadError {
    LoadError::Runtime {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Pick the configured output name, or the first output matching `discover`
fn resolve_output(
    configured: Option<&str>,
    outputs: &[String],
    discover: impl Fn(&str) -> bool,
) -> Result<Option<String>, LoadError> {
    match configured {
        Some(name) if outputs.iter().any(|o| o == name) => Ok(Some(name.to_string())),
        Some(name) => Err(LoadError::Incompatible(format!(
            "model has no output named {name}"
        ))),
        None => Ok(outputs.iter().find(|o| discover(o.as_str())).cloned()),
    }
}

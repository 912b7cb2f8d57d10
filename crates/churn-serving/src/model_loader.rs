//! Model loading for serving.
//!
//! The churn model is loaded exactly once at process start and then shared
//! read-only through the [`ModelHandle`] held by [`LoadedModel`].

use crate::error::{ServingError, ServingResult};
use crate::features::{Feature, NUM_FEATURES};
use crate::inference::{build_model, ChurnModel, ModelArtifact, ModelKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared, immutable handle to a churn classifier.
pub type ModelHandle = Arc<dyn ChurnModel>;

/// File name looked up when the model path is a directory.
pub const MODEL_SPEC_FILE: &str = "model_spec.json";

/// Model metadata recorded in the artifact.
#[derive(Debug, Clone, Default)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model description
    pub description: String,

    /// Decision threshold on the churn probability
    pub threshold: f64,
}

/// A loaded model ready for serving.
pub struct LoadedModel {
    /// Path where the model was loaded from
    pub path: PathBuf,

    /// Model version identifier
    pub version: String,

    /// Timestamp when the model was loaded
    pub loaded_at: std::time::Instant,

    /// Model metadata
    pub metadata: ModelMetadata,

    model: ModelHandle,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("path", &self.path)
            .field("version", &self.version)
            .field("loaded_at", &self.loaded_at)
            .field("metadata", &self.metadata)
            .field("kind", &self.model.kind())
            .finish()
    }
}

impl LoadedModel {
    /// Build a loaded model from an in-memory artifact.
    pub fn from_artifact(path: impl Into<PathBuf>, artifact: &ModelArtifact) -> ServingResult<Self> {
        let path = path.into();
        check_feature_names(artifact)?;
        let model: ModelHandle = Arc::from(build_model(artifact)?);
        if model.input_dim() != NUM_FEATURES {
            return Err(ServingError::model_load(format!(
                "model expects {} inputs, the form provides {}",
                model.input_dim(),
                NUM_FEATURES
            )));
        }
        let version = determine_version(&path, artifact);
        Ok(Self {
            path,
            version,
            loaded_at: std::time::Instant::now(),
            metadata: ModelMetadata {
                name: artifact.name.clone(),
                description: artifact.description.clone(),
                threshold: artifact.threshold,
            },
            model,
        })
    }

    /// Shared handle to the classifier.
    pub fn handle(&self) -> ModelHandle {
        Arc::clone(&self.model)
    }

    /// Model family.
    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }
}

/// Load a churn model from a JSON file, or from `model_spec.json` inside a directory.
///
/// # Errors
///
/// Returns [`ServingError::ModelLoadError`] when the file is missing,
/// unreadable, not valid JSON, or describes a model that does not take the
/// seventeen form features in their fixed order.
pub fn load_model(path: impl AsRef<Path>) -> ServingResult<LoadedModel> {
    let path = path.as_ref();
    info!("Loading model from: {:?}", path);

    if !path.exists() {
        return Err(ServingError::ModelLoadError(format!(
            "Model path does not exist: {:?}",
            path
        )));
    }

    let spec_path = if path.is_dir() {
        path.join(MODEL_SPEC_FILE)
    } else {
        path.to_path_buf()
    };

    let json = std::fs::read_to_string(&spec_path).map_err(|e| {
        ServingError::ModelLoadError(format!("Failed to read {:?}: {}", spec_path, e))
    })?;
    let artifact: ModelArtifact = serde_json::from_str(&json).map_err(|e| {
        ServingError::ModelLoadError(format!("Failed to parse {:?}: {}", spec_path, e))
    })?;
    debug!(
        "Parsed model artifact: name={:?}, threshold={}",
        artifact.name, artifact.threshold
    );

    let loaded = LoadedModel::from_artifact(path, &artifact)?;
    info!(
        "Model loaded successfully: kind={}, version={}",
        loaded.kind(),
        loaded.version
    );
    Ok(loaded)
}

fn check_feature_names(artifact: &ModelArtifact) -> ServingResult<()> {
    let Some(names) = &artifact.feature_names else {
        return Ok(());
    };
    if names.len() != NUM_FEATURES {
        return Err(ServingError::model_load(format!(
            "model lists {} feature names, expected {}",
            names.len(),
            NUM_FEATURES
        )));
    }
    for (i, (name, feature)) in names.iter().zip(Feature::ALL).enumerate() {
        if name != feature.key() {
            return Err(ServingError::model_load(format!(
                "feature {i} is {name:?}, expected {:?}",
                feature.key()
            )));
        }
    }
    Ok(())
}

fn determine_version(path: &Path, artifact: &ModelArtifact) -> String {
    if let Some(version) = artifact.version.as_ref().filter(|v| !v.is_empty()) {
        return version.clone();
    }

    // Fall back to the file (or directory) name
    path.file_stem()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

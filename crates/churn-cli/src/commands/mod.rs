//! CLI Command Implementations
//!
//! - [`predict`]: one-shot prediction
//! - [`form`]: interactive terminal form
//! - [`serve`]: HTTP form server
//! - [`inspect`]: model artifact summary

mod form;
mod inspect;
mod predict;
mod serve;

pub use form::FormCommand;
pub use inspect::InspectCommand;
pub use predict::{OutputFormat, PredictCommand};
pub use serve::ServeCommand;

use anyhow::{Context, Result};
use churn_serving::config::{AppConfig, AppConfigBuilder};
use churn_serving::{load_model, ImportanceMethod, LoadedModel, Predictor};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// Model and configuration flags shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// Model artifact file, or a directory holding model_spec.json
    #[arg(long, short = 'm', env = "CHURN_MODEL_PATH")]
    pub model: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, short = 'c', env = "CHURN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Importance chart method: auto, native, occlusion, placeholder or none
    #[arg(long)]
    pub importance: Option<ImportanceMethod>,

    /// Seed for the placeholder chart
    #[arg(long)]
    pub seed: Option<u64>,
}

impl ModelArgs {
    /// Config file (or defaults) with the flags applied on top.
    pub fn config_builder(&self) -> Result<AppConfigBuilder> {
        let base = match &self.config {
            Some(path) => AppConfig::from_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => AppConfig::default(),
        };

        let mut builder = AppConfigBuilder::from_config(base);
        if let Some(model) = &self.model {
            builder = builder.model_path(model);
        }
        if let Some(method) = self.importance {
            builder = builder.importance(method);
        }
        if let Some(seed) = self.seed {
            builder = builder.placeholder_seed(seed);
        }
        Ok(builder)
    }

    /// Resolved and validated configuration.
    pub fn resolve(&self) -> Result<AppConfig> {
        let config = self.config_builder()?.build();
        config.validate()?;
        Ok(config)
    }
}

/// Load the configured model. Failure here is fatal for every command.
pub(crate) fn load(config: &AppConfig) -> Result<LoadedModel> {
    let model = load_model(&config.model_path)
        .with_context(|| format!("Failed to load model from {:?}", config.model_path))?;
    info!(
        name = %model.metadata.name,
        version = %model.version,
        kind = %model.kind(),
        "Model ready"
    );
    Ok(model)
}

pub(crate) fn predictor(config: &AppConfig, model: &LoadedModel) -> Predictor {
    Predictor::new(model.handle(), config.importance).with_placeholder_seed(config.placeholder_seed)
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flags_override_config_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"{"model_path": "from-file.json", "importance": "none", "chart_width": 12}"#,
        )
        .unwrap();

        let args = ModelArgs {
            model: Some(PathBuf::from("from-flag.json")),
            config: Some(file.path().to_path_buf()),
            importance: Some(ImportanceMethod::Occlusion),
            seed: Some(3),
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.model_path, PathBuf::from("from-flag.json"));
        assert_eq!(config.importance, ImportanceMethod::Occlusion);
        assert_eq!(config.chart_width, 12);
        assert_eq!(config.placeholder_seed, Some(3));
    }

    #[test]
    fn test_defaults_without_flags() {
        let config = ModelArgs::default().resolve().unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let config = AppConfig::builder().model_path("/nonexistent/classify.json").build();
        let err = load(&config).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load model"));
    }
}

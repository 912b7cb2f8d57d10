//! Application configuration for the churn front-ends.
//!
//! Settings come from an optional JSON file and are then overridden by
//! command-line flags.

use crate::error::{ServingError, ServingResult};
use crate::importance::ImportanceMethod;
use crate::render::DEFAULT_CHART_WIDTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default model artifact path.
pub const DEFAULT_MODEL_PATH: &str = "classify.json";

/// Default HTTP listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8501";

/// Configuration shared by all commands.
///
/// # Example
///
/// ```
/// use churn_serving::config::AppConfig;
/// use churn_serving::ImportanceMethod;
///
/// let config = AppConfig::builder()
///     .model_path("/models/classify.json")
///     .importance(ImportanceMethod::Occlusion)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Model artifact (file or directory)
    pub model_path: PathBuf,

    /// HTTP address for `serve`
    pub listen_addr: String,

    /// Importance chart method
    pub importance: ImportanceMethod,

    /// Text chart width in characters
    pub chart_width: usize,

    /// Seed for the placeholder chart
    pub placeholder_seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            importance: ImportanceMethod::Auto,
            chart_width: DEFAULT_CHART_WIDTH,
            placeholder_seed: None,
        }
    }
}

impl AppConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Read a configuration file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> ServingResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ServingError::config(format!("Failed to read config {:?}: {}", path, e))
        })?;
        let config: AppConfig = serde_json::from_str(&json).map_err(|e| {
            ServingError::config(format!("Failed to parse config {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ServingResult<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(ServingError::config("model_path is empty"));
        }
        if self.chart_width == 0 {
            return Err(ServingError::config("chart_width must be > 0"));
        }
        if self
            .listen_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ServingError::config(format!(
                "listen_addr {:?} is not host:port",
                self.listen_addr
            )));
        }
        Ok(())
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    model_path: Option<PathBuf>,
    listen_addr: Option<String>,
    importance: Option<ImportanceMethod>,
    chart_width: Option<usize>,
    placeholder_seed: Option<u64>,
}

impl AppConfigBuilder {
    /// Start from an existing configuration instead of the defaults.
    pub fn from_config(config: AppConfig) -> Self {
        Self {
            model_path: Some(config.model_path),
            listen_addr: Some(config.listen_addr),
            importance: Some(config.importance),
            chart_width: Some(config.chart_width),
            placeholder_seed: config.placeholder_seed,
        }
    }

    /// Set the model path.
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Set the listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Set the importance method.
    pub fn importance(mut self, method: ImportanceMethod) -> Self {
        self.importance = Some(method);
        self
    }

    /// Set the text chart width.
    pub fn chart_width(mut self, width: usize) -> Self {
        self.chart_width = Some(width);
        self
    }

    /// Set the placeholder seed.
    pub fn placeholder_seed(mut self, seed: u64) -> Self {
        self.placeholder_seed = Some(seed);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> AppConfig {
        let default = AppConfig::default();
        AppConfig {
            model_path: self.model_path.unwrap_or(default.model_path),
            listen_addr: self.listen_addr.unwrap_or(default.listen_addr),
            importance: self.importance.unwrap_or(default.importance),
            chart_width: self.chart_width.unwrap_or(default.chart_width),
            placeholder_seed: self.placeholder_seed.or(default.placeholder_seed),
        }
    }
}

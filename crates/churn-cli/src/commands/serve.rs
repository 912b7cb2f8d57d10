//! Serve Command Implementation
//!
//! Serves the single-page prediction form and the JSON API over HTTP.

use super::{load, predictor, ModelArgs};
use anyhow::{Context, Result};
use churn_serving::server::serve;
use churn_serving::{AppState, ModelInfo};
use clap::Args;
use std::sync::Arc;
use tracing::info;

/// Serve the prediction form over HTTP
///
/// The model is loaded once before the listener binds; a load failure stops
/// the command.
///
/// # Example
///
/// ```bash
/// churn serve \
///     --model /models/classify.json \
///     --listen 0.0.0.0:8501
/// ```
#[derive(Args, Debug, Clone, Default)]
pub struct ServeCommand {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Address to listen on (host:port)
    #[arg(long, short = 'l', env = "CHURN_LISTEN_ADDR")]
    pub listen: Option<String>,
}

impl ServeCommand {
    /// Execute the serve command
    pub async fn run(&self) -> Result<()> {
        let config = self.config()?;
        let model = load(&config)?;
        let state = Arc::new(AppState::new(
            predictor(&config, &model),
            ModelInfo::from(&model),
        ));

        info!(
            listen_addr = %config.listen_addr,
            importance = %config.importance,
            "Starting churn form server..."
        );

        tokio::select! {
            result = serve(&config.listen_addr, state) => {
                result.with_context(|| format!("Server on {} failed", config.listen_addr))?;
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for shutdown signal")?;
                info!("Received shutdown signal, stopping server...");
            }
        }
        Ok(())
    }

    fn config(&self) -> Result<churn_serving::AppConfig> {
        let mut builder = self.model.config_builder()?;
        if let Some(listen) = &self.listen {
            builder = builder.listen_addr(listen);
        }
        let config = builder.build();
        config.validate()?;
        Ok(config)
    }
}

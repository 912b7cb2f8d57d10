//! Churn CLI - predict telecom customer churn from the terminal or a browser.
//!
//! This binary wraps the `churn-serving` library: one-shot predictions from
//! flags, an interactive terminal form, and the HTTP form server.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use churn_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for predictions.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("churn=info".parse()?))
        .init();

    let cli = Cli::parse();

    info!("Churn CLI starting...");

    match cli.command {
        Commands::Predict(cmd) => cmd.run().await?,
        Commands::Form(cmd) => cmd.run().await?,
        Commands::Serve(cmd) => cmd.run().await?,
        Commands::Inspect(cmd) => cmd.run().await?,
    }

    Ok(())
}

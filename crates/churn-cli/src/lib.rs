//! Churn CLI Library
//!
//! Command-line front-ends for the telecom churn model:
//!
//! - **Predict**: one prediction from flags or a JSON file
//! - **Form**: interactive terminal form, one prompt per field
//! - **Serve**: the single-page HTML form over HTTP
//! - **Inspect**: summary of a model artifact
//!
//! # Example
//!
//! ```bash
//! # Predict from flags, everything else stays 0
//! churn predict --model classify.json --intl-plan 1 --customer-calls 5
//!
//! # Fill the form interactively
//! churn form --importance occlusion
//!
//! # Serve the form on http://127.0.0.1:8501
//! churn serve --listen 127.0.0.1:8501
//! ```

pub mod commands;

use clap::{Parser, Subcommand};

pub use commands::{FormCommand, InspectCommand, ModelArgs, PredictCommand, ServeCommand};

/// Churn - telecom customer churn prediction
///
/// Collects seventeen usage features, runs a pre-trained binary classifier
/// and explains the answer with a feature importance chart.
#[derive(Parser, Debug)]
#[command(name = "churn")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Predict churn for one customer given as flags or JSON
    Predict(PredictCommand),

    /// Fill in the customer form interactively, then predict
    Form(FormCommand),

    /// Serve the prediction form over HTTP
    Serve(ServeCommand),

    /// Print a summary of a model artifact
    Inspect(InspectCommand),
}

/// Result type alias for CLI operations
pub type CliResult<T> = anyhow::Result<T>;

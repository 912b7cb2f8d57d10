//! Telecom churn prediction: input form, model serving and rendering.
//!
//! This crate turns seventeen telecom usage fields entered by a person into a
//! churn / no-churn answer from a pre-trained binary classifier, along with a
//! per-prediction feature importance chart.
//!
//! # Overview
//!
//! - **Input collection** ([`form`]): one control per feature, each defaulting
//!   to zero, submitted as a whole.
//! - **Model loading** ([`model_loader`], [`inference`]): a JSON model artifact
//!   (logistic regression, MLP or tree ensemble) loaded once and shared
//!   read-only.
//! - **Prediction** ([`predictor`], [`importance`]): builds the `1 x 17`
//!   matrix, calls the model, maps the label to an [`Outcome`].
//! - **Rendering** ([`render`], [`server`]): terminal text, JSON, and the
//!   single-page HTML form served over HTTP.
//!
//! ```text
//!   InputForm ──submit──▶ CustomerFeatures ──▶ Predictor ──▶ Prediction ──▶ render
//!                                                 │
//!                                          Arc<dyn ChurnModel>
//!                                                 ▲
//!                                   load_model("classify.json")
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use churn_serving::{load_model, CustomerFeatures, ImportanceMethod, Predictor};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let model = load_model("classify.json")?;
//! let predictor = Predictor::new(model.handle(), ImportanceMethod::Auto);
//!
//! let features = CustomerFeatures {
//!     account_length: 100,
//!     intl_plan: true,
//!     customer_calls: 5,
//!     ..Default::default()
//! };
//! let prediction = predictor.predict(&features)?;
//! println!("{}", prediction.message());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`ServingResult<T>`] which wraps [`ServingError`]:
//!
//! ```
//! use churn_serving::error::{ServingError, ServingResult};
//!
//! fn handle_error(result: ServingResult<()>) {
//!     match result {
//!         Ok(_) => println!("Success"),
//!         Err(ServingError::InvalidInput { field, reason }) => println!("{field}: {reason}"),
//!         Err(e) if e.is_server_error() => println!("Server error: {}", e),
//!         Err(e) => println!("Error: {}", e),
//!     }
//! }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod features;
pub mod form;
pub mod importance;
pub mod inference;
pub mod model_loader;
pub mod predictor;
pub mod render;
pub mod server;
pub mod session;

// Re-export main types at crate root for convenience
pub use config::AppConfig;
pub use error::{ServingError, ServingResult};
pub use features::{CustomerFeatures, Feature, FeatureVector, FieldKind, NUM_FEATURES};
pub use form::{prompt_form, FormOutcome, InputForm};
pub use importance::{FeatureImportance, ImportanceCalculator, ImportanceMethod};
pub use inference::{ChurnModel, ModelArtifact, ModelKind, ModelSpec};
pub use model_loader::{load_model, LoadedModel, ModelHandle};
pub use predictor::{Outcome, Prediction, Predictor};
pub use server::{build_router, AppState, ModelInfo};
pub use session::{Session, SessionState};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

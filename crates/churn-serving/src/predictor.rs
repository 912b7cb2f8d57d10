//! Churn prediction for one submitted form.
//!
//! The [`Predictor`] owns an injected, read-only [`ModelHandle`]. Prediction
//! is a pure function of the submitted [`CustomerFeatures`] and that handle;
//! rendering the result is left to [`crate::render`].

use crate::error::{ServingError, ServingResult};
use crate::features::CustomerFeatures;
use crate::importance::{FeatureImportance, ImportanceCalculator, ImportanceMethod};
use crate::model_loader::ModelHandle;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, warn};

/// Label the classifier uses for churn.
pub const CHURN_LABEL: i64 = 1;

/// Human-readable interpretation of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The customer is likely to churn.
    Churn,
    /// The customer is likely to stay.
    Retain,
}

impl Outcome {
    /// Exactly label 1 is churn; every other label reads as retain.
    pub fn from_label(label: i64) -> Self {
        if label == CHURN_LABEL {
            Outcome::Churn
        } else {
            Outcome::Retain
        }
    }

    /// Fixed message shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            Outcome::Churn => "⚠️ This customer is likely to churn.",
            Outcome::Retain => "✅ This customer is not likely to churn.",
        }
    }

    pub fn is_churn(&self) -> bool {
        matches!(self, Outcome::Churn)
    }
}

/// Result of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Label exactly as returned by the model.
    pub label: i64,
    pub outcome: Outcome,
    /// Churn probability, when the model computes one.
    pub probability: Option<f64>,
    /// Chart data, absent when importance is disabled.
    pub importance: Option<FeatureImportance>,
}

impl Prediction {
    pub fn message(&self) -> &'static str {
        self.outcome.message()
    }
}

/// Runs the model on submitted features.
#[derive(Debug, Clone)]
pub struct Predictor {
    model: ModelHandle,
    importance: ImportanceCalculator,
}

impl Predictor {
    /// Create a predictor over a loaded model.
    pub fn new(model: ModelHandle, importance: ImportanceMethod) -> Self {
        Self {
            model,
            importance: ImportanceCalculator::new(importance),
        }
    }

    /// Seed for the placeholder chart.
    pub fn with_placeholder_seed(mut self, seed: Option<u64>) -> Self {
        self.importance = self.importance.with_seed(seed);
        self
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn importance_method(&self) -> ImportanceMethod {
        self.importance.method()
    }

    /// Build the `1 x 17` matrix, call the model and return its label unchanged.
    pub fn predict_label(&self, features: &CustomerFeatures) -> ServingResult<i64> {
        features.validate()?;
        let matrix = features.to_vector().to_matrix();
        let labels = self.model.predict(matrix.view())?;
        labels
            .get(0)
            .copied()
            .ok_or_else(|| ServingError::prediction("model returned no label"))
    }

    /// Full prediction: label, outcome, probability and chart data.
    pub fn predict(&self, features: &CustomerFeatures) -> ServingResult<Prediction> {
        let start = Instant::now();
        let label = self.predict_label(features)?;
        if label != 0 && label != CHURN_LABEL {
            warn!(label, "Model returned a label outside {{0, 1}}, reading it as no churn");
        }
        let outcome = Outcome::from_label(label);

        let vector = features.to_vector();
        let probability = self
            .model
            .predict_proba(vector.to_matrix().view())?
            .get(0)
            .copied();
        let importance = self.importance.compute(self.model.as_ref(), &vector)?;

        debug!(
            label,
            ?outcome,
            ?probability,
            latency_us = start.elapsed().as_micros() as u64,
            "Prediction complete"
        );
        Ok(Prediction {
            label,
            outcome,
            probability,
            importance,
        })
    }
}

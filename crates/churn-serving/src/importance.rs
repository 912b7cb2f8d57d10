//! Per-prediction feature importance for the bar chart.

use crate::error::{ServingError, ServingResult};
use crate::features::{Feature, FeatureVector, NUM_FEATURES};
use crate::inference::ChurnModel;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the importance chart values are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceMethod {
    /// Native when the model has it, occlusion otherwise.
    #[default]
    Auto,
    /// Model-native attribution (coefficients, recorded tree importances).
    Native,
    /// Probability change when a feature is reset to its baseline.
    Occlusion,
    /// Random decorative values, unrelated to the model or the input.
    Placeholder,
    /// No chart.
    None,
}

impl ImportanceMethod {
    /// Name used on the command line and in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportanceMethod::Auto => "auto",
            ImportanceMethod::Native => "native",
            ImportanceMethod::Occlusion => "occlusion",
            ImportanceMethod::Placeholder => "placeholder",
            ImportanceMethod::None => "none",
        }
    }
}

impl fmt::Display for ImportanceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportanceMethod {
    type Err = ServingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ImportanceMethod::Auto),
            "native" => Ok(ImportanceMethod::Native),
            "occlusion" => Ok(ImportanceMethod::Occlusion),
            "placeholder" => Ok(ImportanceMethod::Placeholder),
            "none" => Ok(ImportanceMethod::None),
            other => Err(ServingError::config(format!(
                "unknown importance method {other:?}"
            ))),
        }
    }
}

/// One bar of the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImportanceEntry {
    pub feature: Feature,
    pub value: f64,
}

/// Chart data: one entry per feature, sorted by descending value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    /// Method that produced the values (never `auto`).
    pub method: ImportanceMethod,
    pub entries: Vec<ImportanceEntry>,
}

impl FeatureImportance {
    /// Pair values positionally with features and sort descending.
    ///
    /// Ties keep the canonical feature order. Non-finite values are rejected.
    pub fn from_values(method: ImportanceMethod, values: &[f64]) -> ServingResult<Self> {
        if values.len() != NUM_FEATURES {
            return Err(ServingError::prediction(format!(
                "importance has {} values, expected {}",
                values.len(),
                NUM_FEATURES
            )));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ServingError::prediction(format!(
                "{method} importance for {} is not a finite number",
                Feature::ALL[i].key()
            )));
        }
        let mut entries: Vec<ImportanceEntry> = Feature::ALL
            .iter()
            .zip(values)
            .map(|(&feature, &value)| ImportanceEntry { feature, value })
            .collect();
        entries.sort_by(|a, b| b.value.total_cmp(&a.value));
        Ok(Self { method, entries })
    }

    /// Largest value, or zero for an empty chart.
    pub fn max_value(&self) -> f64 {
        self.entries.first().map(|e| e.value).unwrap_or(0.0)
    }

    /// Value for one feature.
    pub fn value_of(&self, feature: Feature) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.feature == feature)
            .map(|e| e.value)
    }
}

/// Computes chart values for one submitted vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportanceCalculator {
    method: ImportanceMethod,
    seed: Option<u64>,
}

impl ImportanceCalculator {
    pub fn new(method: ImportanceMethod) -> Self {
        Self { method, seed: None }
    }

    /// Seed for the placeholder generator; unseeded output differs per call.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn method(&self) -> ImportanceMethod {
        self.method
    }

    /// Compute the chart, or `None` when the method is [`ImportanceMethod::None`].
    pub fn compute(
        &self,
        model: &dyn ChurnModel,
        vector: &FeatureVector,
    ) -> ServingResult<Option<FeatureImportance>> {
        let row = vector.to_matrix();
        let result = match self.method {
            ImportanceMethod::None => return Ok(None),
            ImportanceMethod::Placeholder => {
                FeatureImportance::from_values(ImportanceMethod::Placeholder, &self.placeholder())?
            }
            ImportanceMethod::Native => {
                let values = model.native_importance(row.row(0)).ok_or_else(|| {
                    ServingError::prediction(format!(
                        "{} model has no native feature importance",
                        model.kind()
                    ))
                })?;
                FeatureImportance::from_values(ImportanceMethod::Native, &values)?
            }
            ImportanceMethod::Occlusion => occlusion(model, &row)?,
            ImportanceMethod::Auto => match model.native_importance(row.row(0)) {
                Some(values) => FeatureImportance::from_values(ImportanceMethod::Native, &values)?,
                None => occlusion(model, &row)?,
            },
        };
        Ok(Some(result))
    }

    fn placeholder(&self) -> Vec<f64> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        (0..NUM_FEATURES).map(|_| rng.gen::<f64>()).collect()
    }
}

/// `|p(x) - p(x with x_i := baseline_i)|` for every feature, in one batch.
fn occlusion(model: &dyn ChurnModel, row: &Array2<f64>) -> ServingResult<FeatureImportance> {
    let baseline = model.baseline();
    if baseline.len() != NUM_FEATURES {
        return Err(ServingError::prediction(format!(
            "baseline has {} values, expected {}",
            baseline.len(),
            NUM_FEATURES
        )));
    }
    // Row 0 is the submitted vector, row i + 1 has feature i occluded.
    let mut batch = Array2::zeros((NUM_FEATURES + 1, NUM_FEATURES));
    for mut r in batch.outer_iter_mut() {
        r.assign(&row.row(0));
    }
    for (i, b) in baseline.iter().enumerate() {
        batch[[i + 1, i]] = *b;
    }
    let probs = model.predict_proba(batch.view())?;
    if probs.len() != NUM_FEATURES + 1 {
        return Err(ServingError::prediction("model returned a short probability batch"));
    }
    let reference = probs[0];
    let values: Vec<f64> = (0..NUM_FEATURES)
        .map(|i| (reference - probs[i + 1]).abs())
        .collect();
    FeatureImportance::from_values(ImportanceMethod::Occlusion, &values)
}

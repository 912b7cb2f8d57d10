//! Churn classifiers evaluated in-process.
//!
//! A model artifact is a JSON [`ModelArtifact`]: shared preprocessing
//! (scaler, decision threshold, occlusion baseline) plus a tagged
//! [`ModelSpec`] describing the classifier itself. Three families are
//! supported:
//!
//! - `logistic`: linear model over the scaled features,
//! - `mlp`: feed-forward network evaluated with Candle,
//! - `tree_ensemble`: decision trees in the scikit-learn array layout,
//!   averaged (random forest) or summed as logits (gradient boosting).
//!
//! This does NOT attempt to execute pickled estimators. Training code exports
//! the fitted parameters into this format.

use crate::error::{ServingError, ServingResult};
use crate::features::NUM_FEATURES;
use candle_core::{Device, Tensor};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

fn default_threshold() -> f64 {
    0.5
}

/// Serialized churn model as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Model name.
    #[serde(default)]
    pub name: String,

    /// Model version identifier.
    #[serde(default)]
    pub version: Option<String>,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Column names the model was trained on, if recorded.
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,

    /// Probability at or above which the label is 1.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Standardization applied before evaluation.
    #[serde(default)]
    pub scaler: Option<Scaler>,

    /// Reference values used by occlusion importance (raw feature space).
    #[serde(default)]
    pub baseline: Option<Vec<f64>>,

    /// The classifier itself.
    pub model: ModelSpec,
}

/// `z = (x - mean) / scale`, per column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Scaler {
    fn validate(&self, dim: usize) -> ServingResult<()> {
        if self.mean.len() != dim || self.scale.len() != dim {
            return Err(ServingError::model_load(format!(
                "scaler has {} means and {} scales, expected {}",
                self.mean.len(),
                self.scale.len(),
                dim
            )));
        }
        ensure_finite("scaler.mean", &self.mean)?;
        ensure_finite("scaler.scale", &self.scale)
    }

    fn transform(&self, row: ArrayView1<f64>) -> Array1<f64> {
        Array1::from_shape_fn(row.len(), |j| {
            let scale = if self.scale[j] == 0.0 { 1.0 } else { self.scale[j] };
            (row[j] - self.mean[j]) / scale
        })
    }
}

/// Classifier description, tagged by family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Logistic regression.
    Logistic(LogisticSpec),
    /// Feed-forward network.
    Mlp(MlpSpec),
    /// Decision tree ensemble.
    TreeEnsemble(TreeEnsembleSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticSpec {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpSpec {
    pub input_dim: usize,
    #[serde(default)]
    pub hidden_dims: Vec<usize>,
    /// 1 for a single churn logit, 2 for two-class softmax.
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,
    #[serde(default)]
    pub activation: Activation,
    /// Flat row-major parameters, `mlp.layers.{i}.weight` is `[out, in]`.
    pub params: HashMap<String, Vec<f32>>,
}

fn default_output_dim() -> usize {
    1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Sigmoid,
    None,
}

impl Activation {
    fn apply(&self, t: Tensor) -> candle_core::Result<Tensor> {
        match self {
            Activation::Relu => t.relu(),
            Activation::Tanh => t.tanh(),
            Activation::Sigmoid => candle_nn::ops::sigmoid(&t),
            Activation::None => Ok(t),
        }
    }
}

/// How tree outputs are combined.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Leaf values are class-1 probabilities, averaged over trees.
    #[default]
    Mean,
    /// Leaf values are logit increments: `sigmoid(base_score + lr * sum)`.
    LogitSum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsembleSpec {
    pub trees: Vec<TreeSpec>,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Impurity-based importances recorded at training time.
    #[serde(default)]
    pub feature_importances: Option<Vec<f64>>,
}

fn default_learning_rate() -> f64 {
    1.0
}

/// One tree in array layout; a node is a leaf when both children are -1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSpec {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

/// Model family, for logs and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Logistic,
    Mlp,
    TreeEnsemble,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelKind::Logistic => "logistic",
            ModelKind::Mlp => "mlp",
            ModelKind::TreeEnsemble => "tree_ensemble",
        })
    }
}

/// Binary churn classifier.
///
/// Implementations are immutable once built and shared across requests.
pub trait ChurnModel: Send + Sync + fmt::Debug {
    /// Model family.
    fn kind(&self) -> ModelKind;

    /// Number of input columns.
    fn input_dim(&self) -> usize;

    /// Decision threshold on the churn probability.
    fn threshold(&self) -> f64 {
        0.5
    }

    /// Churn probability for each row.
    fn predict_proba(&self, rows: ArrayView2<f64>) -> ServingResult<Array1<f64>>;

    /// Label for each row: 1 when the churn probability reaches the threshold.
    fn predict(&self, rows: ArrayView2<f64>) -> ServingResult<Array1<i64>> {
        let threshold = self.threshold();
        let probs = check_probabilities(self.predict_proba(rows)?)?;
        Ok(probs.mapv(|p| if p >= threshold { 1 } else { 0 }))
    }

    /// Reference row used by occlusion importance.
    fn baseline(&self) -> Vec<f64> {
        vec![0.0; self.input_dim()]
    }

    /// Model-native per-feature attribution for one row, if the family has one.
    fn native_importance(&self, _row: ArrayView1<f64>) -> Option<Vec<f64>> {
        None
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn ensure_finite(name: &str, values: &[f64]) -> ServingResult<()> {
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(ServingError::model_load(format!(
            "{name}[{i}] is not a finite number"
        )));
    }
    Ok(())
}

/// A probability the threshold cannot be compared against is a model failure.
fn check_probabilities(probs: Array1<f64>) -> ServingResult<Array1<f64>> {
    if let Some(i) = probs.iter().position(|p| !p.is_finite()) {
        return Err(ServingError::prediction(format!(
            "model produced a non-finite probability for row {i}"
        )));
    }
    Ok(probs)
}

fn check_columns(rows: &ArrayView2<f64>, dim: usize) -> ServingResult<()> {
    if rows.ncols() != dim {
        return Err(ServingError::prediction(format!(
            "input has {} columns, model expects {}",
            rows.ncols(),
            dim
        )));
    }
    Ok(())
}

/// Preprocessing shared by every family.
#[derive(Debug, Clone)]
struct Preprocess {
    threshold: f64,
    scaler: Option<Scaler>,
    baseline: Option<Vec<f64>>,
}

impl Preprocess {
    fn transform(&self, row: ArrayView1<f64>) -> Array1<f64> {
        match &self.scaler {
            Some(scaler) => scaler.transform(row),
            None => row.to_owned(),
        }
    }
}

/// Build an evaluable model from an artifact, validating every dimension.
pub fn build_model(artifact: &ModelArtifact) -> ServingResult<Box<dyn ChurnModel>> {
    if !(0.0..=1.0).contains(&artifact.threshold) {
        return Err(ServingError::model_load(format!(
            "threshold {} is outside [0, 1]",
            artifact.threshold
        )));
    }
    if let Some(scaler) = &artifact.scaler {
        scaler.validate(NUM_FEATURES)?;
    }
    if let Some(baseline) = &artifact.baseline {
        if baseline.len() != NUM_FEATURES {
            return Err(ServingError::model_load(format!(
                "baseline has {} values, expected {}",
                baseline.len(),
                NUM_FEATURES
            )));
        }
        ensure_finite("baseline", baseline)?;
    }
    let pre = Preprocess {
        threshold: artifact.threshold,
        scaler: artifact.scaler.clone(),
        baseline: artifact.baseline.clone(),
    };
    match &artifact.model {
        ModelSpec::Logistic(s) => Ok(Box::new(LogisticModel::new(s, pre)?)),
        ModelSpec::Mlp(s) => Ok(Box::new(MlpModel::from_params(s, pre, &Device::Cpu)?)),
        ModelSpec::TreeEnsemble(s) => Ok(Box::new(TreeEnsembleModel::new(s, pre)?)),
    }
}

#[derive(Debug)]
struct LogisticModel {
    coefficients: Array1<f64>,
    intercept: f64,
    pre: Preprocess,
}

impl LogisticModel {
    fn new(spec: &LogisticSpec, pre: Preprocess) -> ServingResult<Self> {
        if spec.coefficients.len() != NUM_FEATURES {
            return Err(ServingError::model_load(format!(
                "logistic model has {} coefficients, expected {}",
                spec.coefficients.len(),
                NUM_FEATURES
            )));
        }
        ensure_finite("coefficients", &spec.coefficients)?;
        ensure_finite("intercept", &[spec.intercept])?;
        Ok(Self {
            coefficients: Array1::from(spec.coefficients.clone()),
            intercept: spec.intercept,
            pre,
        })
    }
}

impl ChurnModel for LogisticModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Logistic
    }

    fn input_dim(&self) -> usize {
        self.coefficients.len()
    }

    fn threshold(&self) -> f64 {
        self.pre.threshold
    }

    fn predict_proba(&self, rows: ArrayView2<f64>) -> ServingResult<Array1<f64>> {
        check_columns(&rows, self.input_dim())?;
        check_probabilities(
            rows.outer_iter()
                .map(|row| {
                    sigmoid(self.pre.transform(row).dot(&self.coefficients) + self.intercept)
                })
                .collect(),
        )
    }

    fn baseline(&self) -> Vec<f64> {
        self.pre
            .baseline
            .clone()
            .unwrap_or_else(|| vec![0.0; self.input_dim()])
    }

    fn native_importance(&self, row: ArrayView1<f64>) -> Option<Vec<f64>> {
        if row.len() != self.input_dim() {
            return None;
        }
        let z = self.pre.transform(row);
        Some(
            z.iter()
                .zip(self.coefficients.iter())
                .map(|(z, w)| (w * z).abs())
                .collect(),
        )
    }
}

fn tensor_from_vec(
    params: &HashMap<String, Vec<f32>>,
    name: &str,
    shape: &[usize],
    device: &Device,
) -> ServingResult<Tensor> {
    let data = params
        .get(name)
        .ok_or_else(|| ServingError::ModelLoadError(format!("Missing dense param {:?}", name)))?;
    let numel: usize = shape.iter().product();
    if data.len() != numel {
        return Err(ServingError::ModelLoadError(format!(
            "Param {:?} has len {}, expected {} for shape {:?}",
            name,
            data.len(),
            numel,
            shape
        )));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(ServingError::ModelLoadError(format!(
            "Param {:?} contains non-finite values",
            name
        )));
    }
    Tensor::from_slice(data, shape, device)
        .map_err(|e| ServingError::ModelLoadError(format!("Candle tensor init failed: {e}")))
}

fn linear(x: &Tensor, w: &Tensor, b: &Tensor) -> ServingResult<Tensor> {
    // x: [B, in], w: [out, in]
    let wt = w
        .t()
        .map_err(|e| ServingError::PredictionError(format!("transpose failed: {e}")))?;
    let y = x
        .matmul(&wt)
        .map_err(|e| ServingError::PredictionError(format!("matmul failed: {e}")))?;
    y.broadcast_add(b)
        .map_err(|e| ServingError::PredictionError(format!("bias add failed: {e}")))
}

#[derive(Debug)]
struct MlpModel {
    spec_input_dim: usize,
    output_dim: usize,
    activation: Activation,
    // layers: (w, b)
    weights: Vec<(Tensor, Tensor)>,
    device: Device,
    pre: Preprocess,
}

impl MlpModel {
    fn from_params(spec: &MlpSpec, pre: Preprocess, device: &Device) -> ServingResult<Self> {
        if spec.input_dim != NUM_FEATURES {
            return Err(ServingError::model_load(format!(
                "mlp input_dim is {}, expected {}",
                spec.input_dim, NUM_FEATURES
            )));
        }
        if !matches!(spec.output_dim, 1 | 2) {
            return Err(ServingError::model_load(format!(
                "mlp output_dim must be 1 or 2, got {}",
                spec.output_dim
            )));
        }

        let mut weights: Vec<(Tensor, Tensor)> = Vec::new();
        let mut in_dim = spec.input_dim;
        let mut all_layers: Vec<usize> = spec.hidden_dims.clone();
        all_layers.push(spec.output_dim);

        for (i, &out_dim) in all_layers.iter().enumerate() {
            let w_name = format!("mlp.layers.{i}.weight");
            let b_name = format!("mlp.layers.{i}.bias");
            let w = tensor_from_vec(&spec.params, &w_name, &[out_dim, in_dim], device)?;
            let b = tensor_from_vec(&spec.params, &b_name, &[out_dim], device)?;
            weights.push((w, b));
            in_dim = out_dim;
        }

        Ok(Self {
            spec_input_dim: spec.input_dim,
            output_dim: spec.output_dim,
            activation: spec.activation,
            weights,
            device: device.clone(),
            pre,
        })
    }

    fn forward(&self, input: &Tensor) -> ServingResult<Tensor> {
        let mut x = input.clone();
        for (i, (w, b)) in self.weights.iter().enumerate() {
            x = linear(&x, w, b)?;
            let is_last = i + 1 == self.weights.len();
            if !is_last {
                x = self.activation.apply(x).map_err(|e| {
                    ServingError::PredictionError(format!("activation failed: {e}"))
                })?;
            }
        }
        Ok(x)
    }
}

impl ChurnModel for MlpModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Mlp
    }

    fn input_dim(&self) -> usize {
        self.spec_input_dim
    }

    fn threshold(&self) -> f64 {
        self.pre.threshold
    }

    fn predict_proba(&self, rows: ArrayView2<f64>) -> ServingResult<Array1<f64>> {
        check_columns(&rows, self.input_dim())?;
        let batch = rows.nrows();
        let mut flat: Vec<f32> = Vec::with_capacity(batch * self.input_dim());
        for row in rows.outer_iter() {
            flat.extend(self.pre.transform(row).iter().map(|&v| v as f32));
        }
        let input = Tensor::from_vec(flat, (batch, self.input_dim()), &self.device)?;
        let logits = self.forward(&input)?;
        let probs = if self.output_dim == 1 {
            candle_nn::ops::sigmoid(&logits)?.flatten_all()?
        } else {
            candle_nn::ops::softmax(&logits, 1)?.narrow(1, 1, 1)?.flatten_all()?
        };
        let probs: Vec<f32> = probs.to_vec1()?;
        check_probabilities(probs.into_iter().map(f64::from).collect())
    }

    fn baseline(&self) -> Vec<f64> {
        self.pre
            .baseline
            .clone()
            .unwrap_or_else(|| vec![0.0; self.input_dim()])
    }
}

#[derive(Debug)]
struct Tree {
    left: Vec<usize>,
    right: Vec<usize>,
    feature: Vec<usize>,
    threshold: Vec<f64>,
    value: Vec<f64>,
}

const LEAF: i64 = -1;

impl Tree {
    fn new(index: usize, spec: &TreeSpec) -> ServingResult<Self> {
        let n = spec.value.len();
        let err = |msg: String| ServingError::model_load(format!("tree {index}: {msg}"));
        if n == 0 {
            return Err(err("has no nodes".into()));
        }
        if spec.children_left.len() != n
            || spec.children_right.len() != n
            || spec.feature.len() != n
            || spec.threshold.len() != n
        {
            return Err(err("node arrays have different lengths".into()));
        }
        ensure_finite(&format!("tree {index} value"), &spec.value)?;

        let mut left = Vec::with_capacity(n);
        let mut right = Vec::with_capacity(n);
        let mut feature = Vec::with_capacity(n);
        for node in 0..n {
            let (l, r) = (spec.children_left[node], spec.children_right[node]);
            if l == LEAF && r == LEAF {
                left.push(node);
                right.push(node);
                feature.push(0);
                continue;
            }
            // Children must point forward, which also rules out cycles.
            for child in [l, r] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(err(format!("node {node} has invalid child {child}")));
                }
            }
            let f = spec.feature[node];
            if f < 0 || f >= NUM_FEATURES as i64 {
                return Err(err(format!("node {node} splits on unknown feature {f}")));
            }
            if !spec.threshold[node].is_finite() {
                return Err(err(format!("node {node} has a non-finite threshold")));
            }
            left.push(l as usize);
            right.push(r as usize);
            feature.push(f as usize);
        }

        Ok(Self {
            left,
            right,
            feature,
            threshold: spec.threshold.clone(),
            value: spec.value.clone(),
        })
    }

    fn is_leaf(&self, node: usize) -> bool {
        self.left[node] == node
    }

    fn evaluate(&self, row: &Array1<f64>) -> f64 {
        let mut node = 0;
        while !self.is_leaf(node) {
            node = if row[self.feature[node]] <= self.threshold[node] {
                self.left[node]
            } else {
                self.right[node]
            };
        }
        self.value[node]
    }
}

#[derive(Debug)]
struct TreeEnsembleModel {
    trees: Vec<Tree>,
    aggregation: Aggregation,
    base_score: f64,
    learning_rate: f64,
    feature_importances: Option<Vec<f64>>,
    pre: Preprocess,
}

impl TreeEnsembleModel {
    fn new(spec: &TreeEnsembleSpec, pre: Preprocess) -> ServingResult<Self> {
        if spec.trees.is_empty() {
            return Err(ServingError::model_load("tree ensemble has no trees"));
        }
        let trees = spec
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| Tree::new(i, t))
            .collect::<ServingResult<Vec<_>>>()?;
        if let Some(imp) = &spec.feature_importances {
            if imp.len() != NUM_FEATURES {
                return Err(ServingError::model_load(format!(
                    "feature_importances has {} values, expected {}",
                    imp.len(),
                    NUM_FEATURES
                )));
            }
            ensure_finite("feature_importances", imp)?;
        }
        ensure_finite("base_score", &[spec.base_score, spec.learning_rate])?;
        Ok(Self {
            trees,
            aggregation: spec.aggregation,
            base_score: spec.base_score,
            learning_rate: spec.learning_rate,
            feature_importances: spec.feature_importances.clone(),
            pre,
        })
    }
}

impl ChurnModel for TreeEnsembleModel {
    fn kind(&self) -> ModelKind {
        ModelKind::TreeEnsemble
    }

    fn input_dim(&self) -> usize {
        NUM_FEATURES
    }

    fn threshold(&self) -> f64 {
        self.pre.threshold
    }

    fn predict_proba(&self, rows: ArrayView2<f64>) -> ServingResult<Array1<f64>> {
        check_columns(&rows, self.input_dim())?;
        check_probabilities(
            rows.outer_iter()
                .map(|row| {
                    let z = self.pre.transform(row);
                    let total: f64 = self.trees.iter().map(|t| t.evaluate(&z)).sum();
                    match self.aggregation {
                        Aggregation::Mean => (total / self.trees.len() as f64).clamp(0.0, 1.0),
                        Aggregation::LogitSum => {
                            sigmoid(self.base_score + self.learning_rate * total)
                        }
                    }
                })
                .collect(),
        )
    }

    fn baseline(&self) -> Vec<f64> {
        self.pre
            .baseline
            .clone()
            .unwrap_or_else(|| vec![0.0; self.input_dim()])
    }

    fn native_importance(&self, row: ArrayView1<f64>) -> Option<Vec<f64>> {
        let importances = self.feature_importances.as_ref()?;
        if row.len() != importances.len() {
            return None;
        }
        // Global importances, masked to the features this row actually uses.
        Some(
            importances
                .iter()
                .zip(row.iter())
                .map(|(imp, x)| if *x == 0.0 { 0.0 } else { *imp })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn artifact(model: ModelSpec) -> ModelArtifact {
        ModelArtifact {
            name: "test".into(),
            version: None,
            description: String::new(),
            feature_names: None,
            threshold: 0.5,
            scaler: None,
            baseline: None,
            model,
        }
    }

    fn row_with(index: usize, value: f64) -> Array2<f64> {
        let mut m = Array2::zeros((1, NUM_FEATURES));
        m[[0, index]] = value;
        m
    }

    #[test]
    fn test_logistic_probability() {
        let mut coefficients = vec![0.0; NUM_FEATURES];
        coefficients[16] = 1.0;
        let model = build_model(&artifact(ModelSpec::Logistic(LogisticSpec {
            coefficients,
            intercept: -2.0,
        })))
        .unwrap();

        let p = model.predict_proba(row_with(16, 2.0).view()).unwrap();
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert_eq!(model.predict(row_with(16, 2.0).view()).unwrap()[0], 1);
        assert_eq!(model.predict(row_with(16, 1.0).view()).unwrap()[0], 0);
    }

    #[test]
    fn test_logistic_rejects_wrong_coefficient_count() {
        let err = build_model(&artifact(ModelSpec::Logistic(LogisticSpec {
            coefficients: vec![1.0; 5],
            intercept: 0.0,
        })))
        .unwrap_err();
        assert!(matches!(err, ServingError::ModelLoadError(_)));
    }

    #[test]
    fn test_scaler_applied() {
        let mut coefficients = vec![0.0; NUM_FEATURES];
        coefficients[0] = 1.0;
        let mut a = artifact(ModelSpec::Logistic(LogisticSpec {
            coefficients,
            intercept: 0.0,
        }));
        let mut mean = vec![0.0; NUM_FEATURES];
        mean[0] = 100.0;
        let mut scale = vec![1.0; NUM_FEATURES];
        scale[0] = 0.0; // treated as 1
        a.scaler = Some(Scaler { mean, scale });
        let model = build_model(&a).unwrap();
        let p = model.predict_proba(row_with(0, 100.0).view()).unwrap();
        assert!((p[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_column_mismatch_is_prediction_error() {
        let model = build_model(&artifact(ModelSpec::Logistic(LogisticSpec {
            coefficients: vec![0.0; NUM_FEATURES],
            intercept: 0.0,
        })))
        .unwrap();
        let rows = Array2::<f64>::zeros((1, 3));
        let err = model.predict(rows.view()).unwrap_err();
        assert!(matches!(err, ServingError::PredictionError(_)));
    }

    #[test]
    fn test_mlp_single_logit() {
        // 17 -> 1 with weight 1.0 on customer_calls and bias -3.
        let mut weight = vec![0.0f32; NUM_FEATURES];
        weight[16] = 1.0;
        let mut params = HashMap::new();
        params.insert("mlp.layers.0.weight".to_string(), weight);
        params.insert("mlp.layers.0.bias".to_string(), vec![-3.0f32]);
        let model = build_model(&artifact(ModelSpec::Mlp(MlpSpec {
            input_dim: NUM_FEATURES,
            hidden_dims: vec![],
            output_dim: 1,
            activation: Activation::Relu,
            params,
        })))
        .unwrap();

        assert_eq!(model.kind(), ModelKind::Mlp);
        assert_eq!(model.predict(row_with(16, 5.0).view()).unwrap()[0], 1);
        assert_eq!(model.predict(row_with(16, 0.0).view()).unwrap()[0], 0);
        assert!(model.native_importance(row_with(16, 5.0).row(0)).is_none());
    }

    #[test]
    fn test_mlp_two_class_softmax() {
        // Class 0 logit is 0, class 1 logit is customer_calls - 3.
        let mut weight = vec![0.0f32; 2 * NUM_FEATURES];
        weight[NUM_FEATURES + 16] = 1.0;
        let mut params = HashMap::new();
        params.insert("mlp.layers.0.weight".to_string(), weight);
        params.insert("mlp.layers.0.bias".to_string(), vec![0.0f32, -3.0]);
        let model = build_model(&artifact(ModelSpec::Mlp(MlpSpec {
            input_dim: NUM_FEATURES,
            hidden_dims: vec![],
            output_dim: 2,
            activation: Activation::Relu,
            params,
        })))
        .unwrap();

        let mut rows = Array2::zeros((2, NUM_FEATURES));
        rows[[0, 16]] = 5.0;
        let p = model.predict_proba(rows.view()).unwrap();
        assert_eq!(p.len(), 2);
        assert!((p[0] - sigmoid(2.0)).abs() < 1e-5);
        assert!((p[1] - sigmoid(-3.0)).abs() < 1e-5);
        assert_eq!(model.predict(rows.view()).unwrap().to_vec(), vec![1, 0]);
    }

    #[test]
    fn test_non_finite_probability_is_prediction_error() {
        // A tiny scale sends day_mins to infinity; its zero weight then yields NaN.
        let mut coefficients = vec![0.0; NUM_FEATURES];
        coefficients[16] = 1.0;
        let mut a = artifact(ModelSpec::Logistic(LogisticSpec {
            coefficients,
            intercept: 0.0,
        }));
        let mut scale = vec![1.0; NUM_FEATURES];
        scale[8] = 1e-10;
        a.scaler = Some(Scaler {
            mean: vec![0.0; NUM_FEATURES],
            scale,
        });
        let model = build_model(&a).unwrap();

        let mut rows = row_with(8, 1e300);
        rows[[0, 16]] = 30.0;
        let err = model.predict_proba(rows.view()).unwrap_err();
        assert!(matches!(err, ServingError::PredictionError(_)));
        let err = model.predict(rows.view()).unwrap_err();
        assert!(err.is_server_error());
    }

    #[test]
    fn test_default_predict_rejects_nan_probability() {
        #[derive(Debug)]
        struct NanModel;

        impl ChurnModel for NanModel {
            fn kind(&self) -> ModelKind {
                ModelKind::Logistic
            }

            fn input_dim(&self) -> usize {
                NUM_FEATURES
            }

            fn predict_proba(&self, rows: ArrayView2<f64>) -> ServingResult<Array1<f64>> {
                Ok(Array1::from_elem(rows.nrows(), f64::NAN))
            }
        }

        let err = NanModel.predict(row_with(0, 1.0).view()).unwrap_err();
        assert!(matches!(err, ServingError::PredictionError(_)));
    }

    #[test]
    fn test_mlp_missing_param() {
        let err = build_model(&artifact(ModelSpec::Mlp(MlpSpec {
            input_dim: NUM_FEATURES,
            hidden_dims: vec![4],
            output_dim: 1,
            activation: Activation::Relu,
            params: HashMap::new(),
        })))
        .unwrap_err();
        assert!(err.to_string().contains("mlp.layers.0.weight"));
    }

    fn stump(feature: i64, threshold: f64, low: f64, high: f64) -> TreeSpec {
        TreeSpec {
            children_left: vec![1, LEAF, LEAF],
            children_right: vec![2, LEAF, LEAF],
            feature: vec![feature, -2, -2],
            threshold: vec![threshold, -2.0, -2.0],
            value: vec![0.0, low, high],
        }
    }

    #[test]
    fn test_random_forest_mean() {
        let model = build_model(&artifact(ModelSpec::TreeEnsemble(TreeEnsembleSpec {
            trees: vec![stump(16, 3.5, 0.1, 0.9), stump(3, 0.5, 0.2, 0.8)],
            aggregation: Aggregation::Mean,
            base_score: 0.0,
            learning_rate: 1.0,
            feature_importances: None,
        })))
        .unwrap();

        let mut rows = Array2::zeros((2, NUM_FEATURES));
        rows[[1, 16]] = 5.0;
        rows[[1, 3]] = 1.0;
        let p = model.predict_proba(rows.view()).unwrap();
        assert!((p[0] - 0.15).abs() < 1e-12);
        assert!((p[1] - 0.85).abs() < 1e-12);
        assert_eq!(model.predict(rows.view()).unwrap().to_vec(), vec![0, 1]);
    }

    #[test]
    fn test_gradient_boosting_logit_sum() {
        let model = build_model(&artifact(ModelSpec::TreeEnsemble(TreeEnsembleSpec {
            trees: vec![stump(0, 10.0, -1.0, 1.0)],
            aggregation: Aggregation::LogitSum,
            base_score: 0.0,
            learning_rate: 0.5,
            feature_importances: None,
        })))
        .unwrap();
        let p = model.predict_proba(row_with(0, 20.0).view()).unwrap();
        assert!((p[0] - sigmoid(0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_tree_rejects_backward_child() {
        let mut tree = stump(0, 1.0, 0.0, 1.0);
        tree.children_left[0] = 0;
        let err = build_model(&artifact(ModelSpec::TreeEnsemble(TreeEnsembleSpec {
            trees: vec![tree],
            aggregation: Aggregation::Mean,
            base_score: 0.0,
            learning_rate: 1.0,
            feature_importances: None,
        })))
        .unwrap_err();
        assert!(err.to_string().contains("invalid child"));
    }

    #[test]
    fn test_tree_rejects_unknown_feature() {
        let err = build_model(&artifact(ModelSpec::TreeEnsemble(TreeEnsembleSpec {
            trees: vec![stump(17, 1.0, 0.0, 1.0)],
            aggregation: Aggregation::Mean,
            base_score: 0.0,
            learning_rate: 1.0,
            feature_importances: None,
        })))
        .unwrap_err();
        assert!(err.to_string().contains("unknown feature"));
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut a = artifact(ModelSpec::Logistic(LogisticSpec {
            coefficients: vec![0.0; NUM_FEATURES],
            intercept: 0.0,
        }));
        a.threshold = 1.5;
        assert!(build_model(&a).is_err());
    }

    #[test]
    fn test_spec_json_tagging() {
        let json = r#"{
            "name": "m",
            "model": {"type": "logistic", "coefficients": [0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,1], "intercept": 0.25}
        }"#;
        let a: ModelArtifact = serde_json::from_str(json).unwrap();
        assert_eq!(a.threshold, 0.5);
        assert!(matches!(a.model, ModelSpec::Logistic(ref s) if s.intercept == 0.25));
    }
}

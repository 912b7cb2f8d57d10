//! Predict Command Implementation
//!
//! One prediction for one customer. Field values come from an optional JSON
//! file and are overridden by individual flags; anything left unset is 0.

use super::{load, predictor, ModelArgs};
use anyhow::{Context, Result};
use churn_serving::features::{Feature, NUM_FEATURES};
use churn_serving::render::{render_json, render_text};
use churn_serving::{CustomerFeatures, InputForm, Prediction, Predictor};
use clap::{Args, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Output format for a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Message plus a text bar chart
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// One flag per form field.
#[derive(Args, Debug, Clone, Default)]
pub struct FieldArgs {
    /// Account length
    #[arg(long, value_name = "N")]
    pub account_length: Option<String>,
    /// Voice messages
    #[arg(long, value_name = "N")]
    pub voice_messages: Option<String>,
    /// Voice plan subscription (0 or 1)
    #[arg(long, value_name = "0|1")]
    pub voice_plan: Option<String>,
    /// International plan subscription (0 or 1)
    #[arg(long, value_name = "0|1")]
    pub intl_plan: Option<String>,
    /// Number of international calls
    #[arg(long, value_name = "N")]
    pub intl_calls: Option<String>,
    /// International minutes
    #[arg(long, value_name = "X")]
    pub intl_mins: Option<String>,
    /// International call charges ($)
    #[arg(long, value_name = "X")]
    pub intl_charge: Option<String>,
    /// Day calls
    #[arg(long, value_name = "N")]
    pub day_calls: Option<String>,
    /// Daytime minutes used
    #[arg(long, value_name = "X")]
    pub day_mins: Option<String>,
    /// Daytime charge ($)
    #[arg(long, value_name = "X")]
    pub day_charge: Option<String>,
    /// Evening calls
    #[arg(long, value_name = "N")]
    pub eve_calls: Option<String>,
    /// Evening minutes used
    #[arg(long, value_name = "X")]
    pub eve_mins: Option<String>,
    /// Evening charge ($)
    #[arg(long, value_name = "X")]
    pub eve_charge: Option<String>,
    /// Night calls
    #[arg(long, value_name = "N")]
    pub night_calls: Option<String>,
    /// Night minutes used
    #[arg(long, value_name = "X")]
    pub night_mins: Option<String>,
    /// Night charge ($)
    #[arg(long, value_name = "X")]
    pub night_charge: Option<String>,
    /// Customer service calls
    #[arg(long, value_name = "N")]
    pub customer_calls: Option<String>,
}

impl FieldArgs {
    /// Raw flag values in canonical feature order.
    fn raw_values(&self) -> [Option<&str>; NUM_FEATURES] {
        [
            self.account_length.as_deref(),
            self.voice_messages.as_deref(),
            self.voice_plan.as_deref(),
            self.intl_plan.as_deref(),
            self.intl_calls.as_deref(),
            self.intl_mins.as_deref(),
            self.intl_charge.as_deref(),
            self.day_calls.as_deref(),
            self.day_mins.as_deref(),
            self.day_charge.as_deref(),
            self.eve_calls.as_deref(),
            self.eve_mins.as_deref(),
            self.eve_charge.as_deref(),
            self.night_calls.as_deref(),
            self.night_mins.as_deref(),
            self.night_charge.as_deref(),
            self.customer_calls.as_deref(),
        ]
    }

    /// Write every given flag into `form`.
    pub fn apply(&self, form: &mut InputForm) -> Result<()> {
        for (feature, raw) in Feature::ALL.iter().zip(self.raw_values()) {
            if let Some(raw) = raw {
                form.set(*feature, raw)?;
            }
        }
        Ok(())
    }
}

/// Predict churn for one customer
///
/// # Example
///
/// ```bash
/// churn predict \
///     --model classify.json \
///     --account-length 100 \
///     --intl-plan 1 \
///     --customer-calls 5 \
///     --format json
/// ```
#[derive(Args, Debug, Clone, Default)]
pub struct PredictCommand {
    #[command(flatten)]
    pub model: ModelArgs,

    /// JSON file with customer fields; flags override its values
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    #[command(flatten)]
    pub fields: FieldArgs,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl PredictCommand {
    /// Execute the predict command
    pub async fn run(&self) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.execute(&mut out)
    }

    /// Predict and write the result to `out`.
    pub fn execute<W: Write>(&self, out: &mut W) -> Result<()> {
        let config = self.model.resolve()?;
        let features = self.features()?;
        let model = load(&config)?;
        let prediction = self.predict(&predictor(&config, &model), &features)?;

        match self.format {
            OutputFormat::Text => render_text(out, &prediction, config.chart_width)?,
            OutputFormat::Json => render_json(out, &prediction)?,
        }
        Ok(())
    }

    /// Customer record built from `--input` and the field flags.
    pub fn features(&self) -> Result<CustomerFeatures> {
        let mut form = match &self.input {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read input {:?}", path))?;
                let base: CustomerFeatures = serde_json::from_str(&json)
                    .with_context(|| format!("Failed to parse input {:?}", path))?;
                InputForm::from_features(&base)
            }
            None => InputForm::new(),
        };
        self.fields.apply(&mut form)?;
        Ok(form.submit()?)
    }

    fn predict(&self, predictor: &Predictor, features: &CustomerFeatures) -> Result<Prediction> {
        let prediction = predictor.predict(features)?;
        info!(
            label = prediction.label,
            outcome = ?prediction.outcome,
            "Prediction complete"
        );
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::fixture;
    use churn_serving::ImportanceMethod;
    use tempfile::NamedTempFile;

    fn command() -> PredictCommand {
        PredictCommand {
            model: ModelArgs {
                model: Some(fixture("classify.json")),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_unset_fields_default_to_zero() {
        let features = command().features().unwrap();
        assert_eq!(features, CustomerFeatures::default());
    }

    #[test]
    fn test_flags_override_input_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{"day_mins": 180.5, "customer_calls": 2}"#).unwrap();

        let mut cmd = command();
        cmd.input = Some(file.path().to_path_buf());
        cmd.fields.customer_calls = Some("5".into());

        let features = cmd.features().unwrap();
        assert_eq!(features.day_mins, 180.5);
        assert_eq!(features.customer_calls, 5);
    }

    #[test]
    fn test_invalid_flag_value() {
        let mut cmd = command();
        cmd.fields.intl_plan = Some("yes".into());
        let err = cmd.features().unwrap_err();
        assert!(format!("{err:#}").contains("intl_plan"));
    }

    #[test]
    fn test_text_output_churn() {
        let mut cmd = command();
        cmd.fields = FieldArgs {
            account_length: Some("100".into()),
            intl_plan: Some("1".into()),
            intl_calls: Some("4".into()),
            intl_mins: Some("10.0".into()),
            intl_charge: Some("2.7".into()),
            day_calls: Some("80".into()),
            day_mins: Some("180.5".into()),
            day_charge: Some("30.7".into()),
            eve_calls: Some("90".into()),
            eve_mins: Some("200.0".into()),
            eve_charge: Some("17.0".into()),
            night_calls: Some("70".into()),
            night_mins: Some("190.0".into()),
            night_charge: Some("8.5".into()),
            customer_calls: Some("5".into()),
            ..Default::default()
        };

        let mut out = Vec::new();
        cmd.execute(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("⚠️ This customer is likely to churn."));
        assert!(text.contains("Feature Importance Analysis"));
    }

    #[test]
    fn test_json_output_retain() {
        let mut cmd = command();
        cmd.format = OutputFormat::Json;
        cmd.model.importance = Some(ImportanceMethod::None);

        let mut out = Vec::new();
        cmd.execute(&mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["label"], 0);
        assert_eq!(json["churn"], false);
        assert_eq!(json["message"], "✅ This customer is not likely to churn.");
        assert!(json["importance"].is_null());
    }
}

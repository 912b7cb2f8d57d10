//! Form Command Implementation
//!
//! Interactive terminal version of the input form: one prompt per field,
//! a confirmation, then the prediction and chart.

use super::{load, predictor, ModelArgs};
use anyhow::Result;
use churn_serving::render::{render_text, APP_TITLE};
use churn_serving::{prompt_form, FormOutcome, InputForm, Predictor, Session};
use clap::Args;
use std::io::{BufRead, Write};
use tracing::info;

/// Fill in the customer form interactively
///
/// # Example
///
/// ```bash
/// churn form --model classify.json --importance occlusion
/// ```
#[derive(Args, Debug, Clone, Default)]
pub struct FormCommand {
    #[command(flatten)]
    pub model: ModelArgs,
}

impl FormCommand {
    /// Execute the form command on stdin/stdout
    pub async fn run(&self) -> Result<()> {
        let config = self.model.resolve()?;
        let model = load(&config)?;
        let predictor = predictor(&config, &model);

        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        interact(
            &predictor,
            &mut stdin.lock(),
            &mut stdout.lock(),
            config.chart_width,
        )
    }
}

/// Prompt, submit once and render. Returns without predicting when cancelled.
pub fn interact<R: BufRead, W: Write>(
    predictor: &Predictor,
    reader: &mut R,
    writer: &mut W,
    chart_width: usize,
) -> Result<()> {
    writeln!(writer, "{APP_TITLE}")?;
    writeln!(writer)?;

    let features = match prompt_form(reader, writer, InputForm::new())? {
        FormOutcome::Submitted(features) => features,
        FormOutcome::Cancelled => {
            info!("Form cancelled, nothing submitted");
            writeln!(writer, "Cancelled.")?;
            return Ok(());
        }
    };

    let mut session = Session::new(predictor);
    let prediction = session.submit(&InputForm::from_features(&features))?;
    writeln!(writer)?;
    render_text(writer, prediction, chart_width)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::fixture;
    use churn_serving::{load_model, ImportanceMethod};
    use std::io::Cursor;

    fn run_with_input(input: &str) -> String {
        let model = load_model(fixture("classify.json")).unwrap();
        let predictor = Predictor::new(model.handle(), ImportanceMethod::Native);
        let mut out = Vec::new();
        interact(&predictor, &mut Cursor::new(input), &mut out, 20).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_defaults_then_confirm() {
        // Seventeen empty answers keep every zero, then confirm.
        let input = format!("{}y\n", "\n".repeat(17));
        let out = run_with_input(&input);
        assert!(out.starts_with("Telecom Churn Prediction App"));
        assert!(out.contains("✅ This customer is not likely to churn."));
    }

    #[test]
    fn test_cancel_skips_prediction() {
        let input = format!("{}n\n", "\n".repeat(17));
        let out = run_with_input(&input);
        assert!(out.contains("Cancelled."));
        assert!(!out.contains("likely to churn"));
    }

    #[test]
    fn test_churn_answers() {
        let answers = [
            "100", "0", "0", "1", "4", "10.0", "2.7", "80", "180.5", "30.7", "90", "200.0",
            "17.0", "70", "190.0", "8.5", "5", "y",
        ];
        let out = run_with_input(&(answers.join("\n") + "\n"));
        assert!(out.contains("⚠️ This customer is likely to churn."));
        assert!(out.contains("International Plan"));
    }
}

//! Inspect Command Implementation

use super::{load, ModelArgs};
use anyhow::Result;
use churn_serving::features::Feature;
use churn_serving::LoadedModel;
use clap::Args;
use std::io::Write;

/// Print a summary of a model artifact
#[derive(Args, Debug, Clone, Default)]
pub struct InspectCommand {
    #[command(flatten)]
    pub model: ModelArgs,
}

impl InspectCommand {
    /// Execute the inspect command
    pub async fn run(&self) -> Result<()> {
        let config = self.model.resolve()?;
        let model = load(&config)?;
        let stdout = std::io::stdout();
        describe(&model, &mut stdout.lock())
    }
}

/// Write name, version, kind, threshold, input size and feature order.
pub fn describe<W: Write>(model: &LoadedModel, out: &mut W) -> Result<()> {
    let handle = model.handle();
    writeln!(out, "Model:       {}", model.metadata.name)?;
    writeln!(out, "Version:     {}", model.version)?;
    writeln!(out, "Kind:        {}", model.kind())?;
    writeln!(out, "Path:        {}", model.path.display())?;
    if !model.metadata.description.is_empty() {
        writeln!(out, "Description: {}", model.metadata.description)?;
    }
    writeln!(out, "Threshold:   {}", handle.threshold())?;
    writeln!(out, "Inputs:      {}", handle.input_dim())?;
    writeln!(out, "Features:")?;
    for feature in Feature::ALL {
        writeln!(
            out,
            "  {:>2}  {:<16} {}",
            feature.index(),
            feature.key(),
            feature.label()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::fixture;
    use churn_serving::load_model;

    #[test]
    fn test_describe_logistic() {
        let model = load_model(fixture("classify.json")).unwrap();
        let mut out = Vec::new();
        describe(&model, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Model:       telecom-churn"));
        assert!(text.contains("Version:     logreg-2024.1"));
        assert!(text.contains("Kind:        logistic"));
        assert!(text.contains("Inputs:      17"));
        assert!(text.contains("customer_calls"));
    }

    #[test]
    fn test_describe_forest() {
        let model = load_model(fixture("random_forest.json")).unwrap();
        let mut out = Vec::new();
        describe(&model, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Kind:        tree_ensemble"));
        assert!(text.contains("Threshold:   0.5"));
    }
}

//! Input collection: one control per feature, submitted as a whole.
//!
//! [`InputForm`] holds the current value of every control. All controls start
//! at zero, so [`InputForm::submit`] always yields a complete record.
//! [`prompt_form`] drives the form from a line-oriented terminal.

use crate::error::{ServingError, ServingResult};
use crate::features::{
    parse_value, CustomerFeatures, Feature, FeatureVector, FieldKind, NUM_FEATURES,
};
use std::io::{BufRead, Write};
use tracing::debug;

/// Current values of the seventeen form controls.
#[derive(Debug, Clone, PartialEq)]
pub struct InputForm {
    values: [f64; NUM_FEATURES],
}

impl Default for InputForm {
    fn default() -> Self {
        Self::new()
    }
}

impl InputForm {
    /// A form with every control at its zero default.
    pub fn new() -> Self {
        Self {
            values: [0.0; NUM_FEATURES],
        }
    }

    /// A form prefilled from an existing record.
    pub fn from_features(features: &CustomerFeatures) -> Self {
        let v = features.to_vector();
        let mut values = [0.0; NUM_FEATURES];
        values.copy_from_slice(v.as_slice());
        Self { values }
    }

    /// Set one control from raw text. On error the previous value is kept.
    pub fn set(&mut self, feature: Feature, raw: &str) -> ServingResult<()> {
        let value = parse_value(feature, raw)?;
        self.values[feature.index()] = value;
        Ok(())
    }

    /// Set controls from `(key, raw)` pairs such as a url-encoded form post.
    ///
    /// Every pair is applied. Keys not present, and keys posted with an empty
    /// value, keep their current value. A rejected pair leaves its control
    /// unchanged; all rejections are returned together, in posting order.
    pub fn apply_pairs<K, V, I>(&mut self, pairs: I) -> Result<(), Vec<ServingError>>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut errors = Vec::new();
        for (key, raw) in pairs {
            let feature: Feature = match key.as_ref().parse() {
                Ok(feature) => feature,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            if raw.as_ref().trim().is_empty() {
                continue;
            }
            if let Err(e) = self.set(feature, raw.as_ref()) {
                errors.push(e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Build a form from `(key, raw)` pairs on top of the zero defaults.
    ///
    /// Fails with the first rejected pair.
    pub fn from_pairs<K, V, I>(pairs: I) -> ServingResult<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut form = Self::new();
        match form.apply_pairs(pairs) {
            Ok(()) => Ok(form),
            Err(mut errors) => Err(errors.remove(0)),
        }
    }

    /// Current value of one control.
    pub fn value(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    /// Current value formatted the way the control displays it.
    pub fn display_value(&self, feature: Feature) -> String {
        let value = self.value(feature);
        match feature.kind() {
            FieldKind::Count | FieldKind::Flag => format!("{}", value as u64),
            FieldKind::Amount => format!("{value:.2}"),
        }
    }

    /// The submit trigger: the complete, ordered record of current values.
    pub fn submit(&self) -> ServingResult<CustomerFeatures> {
        CustomerFeatures::from_vector(&FeatureVector::new(self.values))
    }
}

/// Outcome of an interactive form session.
#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome {
    /// The user confirmed the submission.
    Submitted(CustomerFeatures),
    /// The user declined to submit.
    Cancelled,
}

fn read_line<R: BufRead>(reader: &mut R) -> ServingResult<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn hint(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Count => "whole number >= 0",
        FieldKind::Flag => "0 or 1",
        FieldKind::Amount => "number >= 0",
    }
}

/// Prompt for every field on `writer`, reading answers from `reader`.
///
/// An empty answer, or end of input, keeps the field's current value. Invalid
/// answers are reported and asked again. After the last field the user must
/// confirm before the form is submitted.
pub fn prompt_form<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    mut form: InputForm,
) -> ServingResult<FormOutcome> {
    writeln!(writer, "User Input Features")?;
    let mut eof = false;
    for feature in Feature::ALL {
        loop {
            if eof {
                break;
            }
            write!(
                writer,
                "{} ({}) [{}]: ",
                feature.label(),
                hint(feature.kind()),
                form.display_value(feature)
            )?;
            writer.flush()?;
            let Some(answer) = read_line(reader)? else {
                eof = true;
                writeln!(writer)?;
                break;
            };
            if answer.is_empty() {
                break;
            }
            match form.set(feature, &answer) {
                Ok(()) => break,
                Err(ServingError::InvalidInput { reason, .. }) => {
                    writeln!(writer, "  invalid value: {reason}")?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    let confirmed = if eof {
        // Nothing left to read; treat the closed input as the submit action.
        true
    } else {
        write!(writer, "Predict churn? [Y/n]: ")?;
        writer.flush()?;
        match read_line(reader)? {
            None => true,
            Some(answer) => !matches!(answer.to_ascii_lowercase().as_str(), "n" | "no"),
        }
    };

    if !confirmed {
        debug!("Form submission declined");
        return Ok(FormOutcome::Cancelled);
    }
    Ok(FormOutcome::Submitted(form.submit()?))
}

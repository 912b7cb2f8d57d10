//! The seventeen telecom usage features and their fixed vector layout.
//!
//! A [`CustomerFeatures`] is the typed record collected from the form. It
//! converts into a [`FeatureVector`], the fixed-order `f64` row handed to the
//! classifier.

use crate::error::{ServingError, ServingResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of features in the model input.
pub const NUM_FEATURES: usize = 17;

/// Value domain of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Non-negative integer (call and message counts, account length).
    Count,
    /// Plan subscription flag, exactly 0 or 1.
    Flag,
    /// Non-negative finite float (minutes and charges).
    Amount,
}

/// One input feature, in model column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AccountLength,
    VoiceMessages,
    VoicePlan,
    IntlPlan,
    IntlCalls,
    IntlMins,
    IntlCharge,
    DayCalls,
    DayMins,
    DayCharge,
    EveCalls,
    EveMins,
    EveCharge,
    NightCalls,
    NightMins,
    NightCharge,
    CustomerCalls,
}

impl Feature {
    /// All features in model column order.
    pub const ALL: [Feature; NUM_FEATURES] = [
        Feature::AccountLength,
        Feature::VoiceMessages,
        Feature::VoicePlan,
        Feature::IntlPlan,
        Feature::IntlCalls,
        Feature::IntlMins,
        Feature::IntlCharge,
        Feature::DayCalls,
        Feature::DayMins,
        Feature::DayCharge,
        Feature::EveCalls,
        Feature::EveMins,
        Feature::EveCharge,
        Feature::NightCalls,
        Feature::NightMins,
        Feature::NightCharge,
        Feature::CustomerCalls,
    ];

    /// Column index in the feature vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable snake_case key used in JSON, form posts and model files.
    pub fn key(self) -> &'static str {
        match self {
            Feature::AccountLength => "account_length",
            Feature::VoiceMessages => "voice_messages",
            Feature::VoicePlan => "voice_plan",
            Feature::IntlPlan => "intl_plan",
            Feature::IntlCalls => "intl_calls",
            Feature::IntlMins => "intl_mins",
            Feature::IntlCharge => "intl_charge",
            Feature::DayCalls => "day_calls",
            Feature::DayMins => "day_mins",
            Feature::DayCharge => "day_charge",
            Feature::EveCalls => "eve_calls",
            Feature::EveMins => "eve_mins",
            Feature::EveCharge => "eve_charge",
            Feature::NightCalls => "night_calls",
            Feature::NightMins => "night_mins",
            Feature::NightCharge => "night_charge",
            Feature::CustomerCalls => "customer_calls",
        }
    }

    /// Label shown next to the form control.
    pub fn label(self) -> &'static str {
        match self {
            Feature::AccountLength => "Account Length",
            Feature::VoiceMessages => "Voice Messages",
            Feature::VoicePlan => "Voice Plan Subscription",
            Feature::IntlPlan => "International Plan Subscription",
            Feature::IntlCalls => "Number of International Calls",
            Feature::IntlMins => "International Minutes",
            Feature::IntlCharge => "International Call Charges ($)",
            Feature::DayCalls => "Day Calls",
            Feature::DayMins => "Daytime Minutes Used",
            Feature::DayCharge => "Daytime Charge ($)",
            Feature::EveCalls => "Evening Calls",
            Feature::EveMins => "Evening Minutes Used",
            Feature::EveCharge => "Evening Charge ($)",
            Feature::NightCalls => "Night Calls",
            Feature::NightMins => "Night Minutes Used",
            Feature::NightCharge => "Night Charge ($)",
            Feature::CustomerCalls => "Customer Service Calls",
        }
    }

    /// Shorter label used on the importance chart axis.
    pub fn chart_label(self) -> &'static str {
        match self {
            Feature::AccountLength => "Account Length",
            Feature::VoiceMessages => "Voice Messages",
            Feature::VoicePlan => "Voice Plan",
            Feature::IntlPlan => "International Plan",
            Feature::IntlCalls => "International Calls",
            Feature::IntlMins => "International Minutes",
            Feature::IntlCharge => "International Call Charges",
            Feature::DayCalls => "Day Calls",
            Feature::DayMins => "Daytime Minutes",
            Feature::DayCharge => "Daytime Charge",
            Feature::EveCalls => "Evening Calls",
            Feature::EveMins => "Evening Minutes",
            Feature::EveCharge => "Evening Charge",
            Feature::NightCalls => "Night Calls",
            Feature::NightMins => "Night Minutes",
            Feature::NightCharge => "Night Charge",
            Feature::CustomerCalls => "Customer Calls",
        }
    }

    /// Value domain of this feature.
    pub fn kind(self) -> FieldKind {
        match self {
            Feature::VoicePlan | Feature::IntlPlan => FieldKind::Flag,
            Feature::IntlMins
            | Feature::IntlCharge
            | Feature::DayMins
            | Feature::DayCharge
            | Feature::EveMins
            | Feature::EveCharge
            | Feature::NightMins
            | Feature::NightCharge => FieldKind::Amount,
            _ => FieldKind::Count,
        }
    }

    /// Look up a feature by its key.
    pub fn from_key(key: &str) -> Option<Feature> {
        Feature::ALL.iter().copied().find(|f| f.key() == key)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Feature {
    type Err = ServingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::from_key(s).ok_or_else(|| ServingError::invalid_input(s, "unknown field"))
    }
}

/// Parse one raw textual value for `feature` into its `f64` vector value.
///
/// Nothing is coerced: fractional counts, flags other than 0/1, negative and
/// non-finite numbers are rejected.
pub fn parse_value(feature: Feature, raw: &str) -> ServingResult<f64> {
    let raw = raw.trim();
    let field = feature.key();
    if raw.is_empty() {
        return Err(ServingError::invalid_input(field, "value is empty"));
    }
    match feature.kind() {
        FieldKind::Count => {
            let value: i64 = raw.parse().map_err(|_| {
                ServingError::invalid_input(field, format!("expected a whole number, got {raw:?}"))
            })?;
            if value < 0 {
                return Err(ServingError::invalid_input(field, "must be >= 0"));
            }
            if value > u32::MAX as i64 {
                return Err(ServingError::invalid_input(field, "value is too large"));
            }
            Ok(value as f64)
        }
        FieldKind::Flag => match raw {
            "0" => Ok(0.0),
            "1" => Ok(1.0),
            _ => Err(ServingError::invalid_input(
                field,
                format!("expected 0 or 1, got {raw:?}"),
            )),
        },
        FieldKind::Amount => {
            let value: f64 = raw.parse().map_err(|_| {
                ServingError::invalid_input(field, format!("expected a number, got {raw:?}"))
            })?;
            check_amount(feature, value)?;
            Ok(value)
        }
    }
}

fn check_amount(feature: Feature, value: f64) -> ServingResult<()> {
    if !value.is_finite() {
        return Err(ServingError::invalid_input(feature.key(), "must be finite"));
    }
    if value < 0.0 {
        return Err(ServingError::invalid_input(feature.key(), "must be >= 0"));
    }
    Ok(())
}

/// Plan flags travel as 0/1 on the wire.
mod flag {
    use serde::de::{self, Deserializer, Unexpected};
    use serde::{Deserialize, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(de::Error::invalid_value(
                Unexpected::Unsigned(other as u64),
                &"0 or 1",
            )),
        }
    }
}

/// The typed record collected from the input form.
///
/// Every field defaults to zero, so a record is always complete.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustomerFeatures {
    pub account_length: u32,
    pub voice_messages: u32,
    #[serde(with = "flag")]
    pub voice_plan: bool,
    #[serde(with = "flag")]
    pub intl_plan: bool,
    pub intl_calls: u32,
    pub intl_mins: f64,
    pub intl_charge: f64,
    pub day_calls: u32,
    pub day_mins: f64,
    pub day_charge: f64,
    pub eve_calls: u32,
    pub eve_mins: f64,
    pub eve_charge: f64,
    pub night_calls: u32,
    pub night_mins: f64,
    pub night_charge: f64,
    pub customer_calls: u32,
}

impl CustomerFeatures {
    /// Check the amount fields, the only ones whose type admits bad values.
    pub fn validate(&self) -> ServingResult<()> {
        let amounts = [
            (Feature::IntlMins, self.intl_mins),
            (Feature::IntlCharge, self.intl_charge),
            (Feature::DayMins, self.day_mins),
            (Feature::DayCharge, self.day_charge),
            (Feature::EveMins, self.eve_mins),
            (Feature::EveCharge, self.eve_charge),
            (Feature::NightMins, self.night_mins),
            (Feature::NightCharge, self.night_charge),
        ];
        for (feature, value) in amounts {
            check_amount(feature, value)?;
        }
        Ok(())
    }

    /// Assemble the fixed-order model input.
    pub fn to_vector(&self) -> FeatureVector {
        FeatureVector([
            self.account_length as f64,
            self.voice_messages as f64,
            f64::from(u8::from(self.voice_plan)),
            f64::from(u8::from(self.intl_plan)),
            self.intl_calls as f64,
            self.intl_mins,
            self.intl_charge,
            self.day_calls as f64,
            self.day_mins,
            self.day_charge,
            self.eve_calls as f64,
            self.eve_mins,
            self.eve_charge,
            self.night_calls as f64,
            self.night_mins,
            self.night_charge,
            self.customer_calls as f64,
        ])
    }

    /// Rebuild a record from vector values.
    ///
    /// Each value must already satisfy its feature's domain, as produced by
    /// [`parse_value`] or [`CustomerFeatures::to_vector`].
    pub fn from_vector(vector: &FeatureVector) -> ServingResult<Self> {
        let v = vector.as_slice();
        let count = |feature: Feature| -> ServingResult<u32> {
            let x = v[feature.index()];
            if !(x.is_finite() && x >= 0.0 && x.fract() == 0.0 && x <= u32::MAX as f64) {
                return Err(ServingError::invalid_input(
                    feature.key(),
                    format!("expected a whole number >= 0, got {x}"),
                ));
            }
            Ok(x as u32)
        };
        let flag = |feature: Feature| -> ServingResult<bool> {
            match v[feature.index()] {
                x if x == 0.0 => Ok(false),
                x if x == 1.0 => Ok(true),
                x => Err(ServingError::invalid_input(
                    feature.key(),
                    format!("expected 0 or 1, got {x}"),
                )),
            }
        };
        let features = Self {
            account_length: count(Feature::AccountLength)?,
            voice_messages: count(Feature::VoiceMessages)?,
            voice_plan: flag(Feature::VoicePlan)?,
            intl_plan: flag(Feature::IntlPlan)?,
            intl_calls: count(Feature::IntlCalls)?,
            intl_mins: v[Feature::IntlMins.index()],
            intl_charge: v[Feature::IntlCharge.index()],
            day_calls: count(Feature::DayCalls)?,
            day_mins: v[Feature::DayMins.index()],
            day_charge: v[Feature::DayCharge.index()],
            eve_calls: count(Feature::EveCalls)?,
            eve_mins: v[Feature::EveMins.index()],
            eve_charge: v[Feature::EveCharge.index()],
            night_calls: count(Feature::NightCalls)?,
            night_mins: v[Feature::NightMins.index()],
            night_charge: v[Feature::NightCharge.index()],
            customer_calls: count(Feature::CustomerCalls)?,
        };
        features.validate()?;
        Ok(features)
    }
}

/// Fixed-order numeric model input, always seventeen `f64` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; NUM_FEATURES]);

impl FeatureVector {
    /// Wrap raw values already in column order.
    pub fn new(values: [f64; NUM_FEATURES]) -> Self {
        Self(values)
    }

    /// Values in column order.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Value of one feature.
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    /// Single-row `1 x 17` matrix for the classifier.
    pub fn to_matrix(&self) -> Array2<f64> {
        Array2::from_shape_fn((1, NUM_FEATURES), |(_, j)| self.0[j])
    }
}

impl From<&CustomerFeatures> for FeatureVector {
    fn from(features: &CustomerFeatures) -> Self {
        features.to_vector()
    }
}

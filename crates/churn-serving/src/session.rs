//! One submission of the form: Idle until submitted, then Predicted.

use crate::error::{ServingError, ServingResult};
use crate::form::InputForm;
use crate::predictor::{Prediction, Predictor};
use tracing::info;

/// Session state.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Awaiting submission.
    Idle,
    /// Outcome computed and ready to render.
    Predicted(Prediction),
}

/// A single form interaction.
///
/// Sessions carry no memory between submissions; front-ends start a new one
/// for every submit.
#[derive(Debug)]
pub struct Session<'a> {
    predictor: &'a Predictor,
    state: SessionState,
}

impl<'a> Session<'a> {
    pub fn new(predictor: &'a Predictor) -> Self {
        Self {
            predictor,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current prediction, once the session has left Idle.
    pub fn prediction(&self) -> Option<&Prediction> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Predicted(p) => Some(p),
        }
    }

    /// The trigger action: Idle -> Predicted.
    ///
    /// A session that already predicted cannot be submitted again.
    pub fn submit(&mut self, form: &InputForm) -> ServingResult<&Prediction> {
        if let SessionState::Predicted(_) = self.state {
            return Err(ServingError::invalid_state(
                "session has already produced a prediction",
            ));
        }
        let features = form.submit()?;
        let prediction = self.predictor.predict(&features)?;
        info!(
            label = prediction.label,
            churn = prediction.outcome.is_churn(),
            "Form submitted"
        );
        self.state = SessionState::Predicted(prediction);
        match &self.state {
            SessionState::Predicted(p) => Ok(p),
            SessionState::Idle => Err(ServingError::invalid_state("session did not advance")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Feature, NUM_FEATURES};
    use crate::importance::ImportanceMethod;
    use crate::inference::{build_model, LogisticSpec, ModelArtifact, ModelSpec};
    use std::sync::Arc;

    fn predictor() -> Predictor {
        let mut coefficients = vec![0.0; NUM_FEATURES];
        coefficients[Feature::CustomerCalls.index()] = 1.0;
        let model = build_model(&ModelArtifact {
            name: "session".into(),
            version: None,
            description: String::new(),
            feature_names: None,
            threshold: 0.5,
            scaler: None,
            baseline: None,
            model: ModelSpec::Logistic(LogisticSpec {
                coefficients,
                intercept: -3.5,
            }),
        })
        .unwrap();
        Predictor::new(Arc::from(model), ImportanceMethod::Auto)
    }

    #[test]
    fn test_idle_to_predicted() {
        let predictor = predictor();
        let mut session = Session::new(&predictor);
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(session.prediction().is_none());

        let mut form = InputForm::new();
        form.set(Feature::CustomerCalls, "5").unwrap();
        let prediction = session.submit(&form).unwrap().clone();
        assert!(prediction.outcome.is_churn());
        assert!(matches!(session.state(), SessionState::Predicted(_)));
        assert_eq!(session.prediction(), Some(&prediction));
    }

    #[test]
    fn test_second_submit_rejected() {
        let predictor = predictor();
        let mut session = Session::new(&predictor);
        let form = InputForm::new();
        session.submit(&form).unwrap();
        let err = session.submit(&form).unwrap_err();
        assert!(matches!(err, ServingError::InvalidState(_)));
    }

    #[test]
    fn test_submissions_are_independent() {
        let predictor = predictor();
        let mut churn_form = InputForm::new();
        churn_form.set(Feature::CustomerCalls, "9").unwrap();

        let first = Session::new(&predictor).submit(&churn_form).unwrap().clone();
        let second = Session::new(&predictor)
            .submit(&InputForm::new())
            .unwrap()
            .clone();
        assert!(first.outcome.is_churn());
        assert!(!second.outcome.is_churn());
    }
}

//! HTTP front-end: the single-page form plus a JSON prediction endpoint.
//!
//! Routes:
//!
//! - `GET /` renders the empty form.
//! - `POST /` takes the url-encoded form, predicts and re-renders the page.
//! - `POST /api/predict` takes [`CustomerFeatures`] as JSON.
//! - `GET /health` reports the loaded model and request counters.

use crate::error::ServingError;
use crate::features::CustomerFeatures;
use crate::form::InputForm;
use crate::inference::ModelKind;
use crate::model_loader::LoadedModel;
use crate::predictor::{Prediction, Predictor};
use crate::render::{render_html, to_json, PagePanel};
use crate::session::Session;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Request counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceStats {
    /// Total number of prediction requests received
    pub total_requests: u64,

    /// Predictions that read as churn
    pub churn_predictions: u64,

    /// Predictions that read as no churn
    pub retain_predictions: u64,

    /// Requests rejected for invalid input
    pub rejected_requests: u64,

    /// Requests that failed inside the model
    pub failed_requests: u64,
}

/// Description of the served model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub kind: ModelKind,
}

impl From<&LoadedModel> for ModelInfo {
    fn from(model: &LoadedModel) -> Self {
        Self {
            name: model.metadata.name.clone(),
            version: model.version.clone(),
            kind: model.kind(),
        }
    }
}

/// Shared handler state.
#[derive(Debug)]
pub struct AppState {
    pub predictor: Predictor,
    pub model: ModelInfo,
    stats: RwLock<ServiceStats>,
}

impl AppState {
    pub fn new(predictor: Predictor, model: ModelInfo) -> Self {
        Self {
            predictor,
            model,
            stats: RwLock::new(ServiceStats::default()),
        }
    }

    /// Snapshot of the request counters.
    pub fn stats(&self) -> ServiceStats {
        self.stats.read().clone()
    }

    fn record(&self, result: Result<&Prediction, &ServingError>) {
        let mut stats = self.stats.write();
        stats.total_requests += 1;
        match result {
            Ok(p) if p.outcome.is_churn() => stats.churn_predictions += 1,
            Ok(_) => stats.retain_predictions += 1,
            Err(e) if e.is_client_error() => stats.rejected_requests += 1,
            Err(_) => stats.failed_requests += 1,
        }
    }
}

fn status_for(err: &ServingError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn index_handler() -> Html<String> {
    Html(render_html(&InputForm::new(), PagePanel::Idle))
}

async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let mut form = InputForm::new();
    if let Err(errors) = form.apply_pairs(pairs) {
        let message = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        warn!(rejected = errors.len(), "Rejected form submission: {}", message);
        let status = errors.first().map(status_for).unwrap_or(StatusCode::UNPROCESSABLE_ENTITY);
        if let Some(e) = errors.first() {
            state.record(Err(e));
        }
        // The page keeps every value that was accepted.
        let page = render_html(&form, PagePanel::Error(&message));
        return (status, Html(page)).into_response();
    }

    let mut session = Session::new(&state.predictor);
    let result = session.submit(&form).cloned();
    state.record(result.as_ref());
    match result {
        Ok(prediction) => Html(render_html(&form, PagePanel::Predicted(&prediction))).into_response(),
        Err(e) => {
            warn!("Prediction failed: {}", e);
            let page = render_html(&form, PagePanel::Error(&e.to_string()));
            (status_for(&e), Html(page)).into_response()
        }
    }
}

async fn api_predict_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CustomerFeatures>, JsonRejection>,
) -> Response {
    let features = match payload {
        Ok(Json(features)) => features,
        Err(rejection) => {
            let err = ServingError::invalid_input("body", rejection.body_text());
            state.record(Err(&err));
            return (status_for(&err), Json(serde_json::json!({ "error": err.to_string() })))
                .into_response();
        }
    };

    let result = state.predictor.predict(&features);
    state.record(result.as_ref());
    match result {
        Ok(prediction) => Json(to_json(&prediction)).into_response(),
        Err(e) => (status_for(&e), Json(serde_json::json!({ "error": e.to_string() })))
            .into_response(),
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "model": state.model,
        "version": state.model.version,
        "importance": state.predictor.importance_method(),
        "stats": state.stats(),
    }))
}

/// Build the axum [`Router`] with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler).post(submit_handler))
        .route("/api/predict", post(api_predict_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind `addr` and serve until the task is dropped or the listener fails.
pub async fn serve(addr: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(listen_addr = %listener.local_addr()?, "Churn form listening");
    axum::serve(listener, build_router(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Feature, NUM_FEATURES};
    use crate::importance::ImportanceMethod;
    use crate::inference::{build_model, LogisticSpec, ModelArtifact, ModelSpec};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let mut coefficients = vec![0.0; NUM_FEATURES];
        coefficients[Feature::CustomerCalls.index()] = 1.0;
        let model = build_model(&ModelArtifact {
            name: "http-test".into(),
            version: Some("t1".into()),
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
        let predictor = Predictor::new(Arc::from(model), ImportanceMethod::Auto);
        Arc::new(AppState::new(
            predictor,
            ModelInfo {
                name: "http-test".into(),
                version: "t1".into(),
                kind: ModelKind::Logistic,
            },
        ))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_renders_form() {
        let app = build_router(test_state());
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("Predict Churn"));
        assert!(body.contains(r#"name="customer_calls""#));
    }

    #[tokio::test]
    async fn test_form_post_predicts_churn() {
        let state = test_state();
        let app = build_router(Arc::clone(&state));
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("customer_calls=5&intl_plan=1&day_mins=120.5"))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("This customer is likely to churn."));
        assert!(body.contains(r#"value="120.50""#));
        assert_eq!(state.stats().churn_predictions, 1);
    }

    #[tokio::test]
    async fn test_form_post_invalid_value() {
        let state = test_state();
        let app = build_router(Arc::clone(&state));
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("day_calls=-4"))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_string(response).await;
        assert!(body.contains("Invalid input for day_calls"));
        assert_eq!(state.stats().rejected_requests, 1);
    }

    #[tokio::test]
    async fn test_form_post_invalid_value_keeps_other_values() {
        let state = test_state();
        let app = build_router(Arc::clone(&state));
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(
                "account_length=100&day_calls=-4&day_mins=120.5&intl_plan=3&customer_calls=5",
            ))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_string(response).await;
        assert!(body.contains(r#"name="account_length" min="0" step="1" value="100""#));
        assert!(body.contains(r#"name="day_mins" min="0" step="0.01" value="120.50""#));
        assert!(body.contains(r#"name="customer_calls" min="0" step="1" value="5""#));
        assert!(body.contains("Invalid input for day_calls"));
        assert!(body.contains("Invalid input for intl_plan"));
        assert_eq!(state.stats().rejected_requests, 1);
    }

    #[tokio::test]
    async fn test_form_post_empty_field_keeps_default() {
        let app = build_router(test_state());
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("account_length=&customer_calls=5"))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("This customer is likely to churn."));
        assert!(body.contains(r#"name="account_length" min="0" step="1" value="0""#));
    }

    #[tokio::test]
    async fn test_api_predict() {
        let app = build_router(test_state());
        let req = Request::builder()
            .method("POST")
            .uri("/api/predict")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"customer_calls": 1}"#))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["label"], 0);
        assert_eq!(json["churn"], false);
        assert_eq!(json["importance"]["entries"].as_array().unwrap().len(), NUM_FEATURES);
    }

    #[tokio::test]
    async fn test_api_predict_rejects_bad_flag() {
        let app = build_router(test_state());
        let req = Request::builder()
            .method("POST")
            .uri("/api/predict")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"intl_plan": 2}"#))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(json["error"].as_str().unwrap().starts_with("Invalid input"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state());
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["model"]["kind"], "logistic");
        assert_eq!(json["model"]["version"], "t1");
        assert_eq!(json["version"], "t1");
        assert_eq!(json["importance"], "auto");
    }
}

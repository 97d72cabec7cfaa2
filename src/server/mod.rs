//! HTTP front end
//!
//! ```text
//! GET  /             current screen (name gate or form)
//! POST /name         submit the user's name
//! POST /predict      submit the form
//! POST /reset        back to the name gate
//! POST /api/predict  JSON prediction
//! GET  /api/schema   feature names and form fields
//! GET  /api/metrics  prediction counters
//! GET  /health       liveness
//! ```

pub mod error;
pub mod handlers;
pub mod sessions;

use crate::config::{AppConfig, PageConfig};
use crate::form::FormPolicy;
use crate::metrics::PredictionMetrics;
use crate::pipeline::PredictionPipeline;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};
pub use sessions::{SessionStore, SessionSweeper};

/// Shared handles passed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub pipeline: PredictionPipeline,
    pub policy: Arc<FormPolicy>,
    pub page: Arc<PageConfig>,
    pub sessions: SessionStore,
    pub metrics: Arc<PredictionMetrics>,
    /// Upper bound on one scoring call
    pub timeout: Duration,
}

impl AppState {
    pub fn new(pipeline: PredictionPipeline, config: &AppConfig, metrics: Arc<PredictionMetrics>) -> Self {
        Self {
            pipeline,
            policy: Arc::new(config.form.clone()),
            page: Arc::new(config.page.clone()),
            sessions: SessionStore::new(),
            metrics,
            timeout: Duration::from_millis(config.inference.timeout_ms.max(1)),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/name", post(handlers::submit_name))
        .route("/predict", post(handlers::predict))
        .route("/reset", post(handlers::reset))
        .route("/api/predict", post(handlers::api_predict))
        .route("/api/schema", get(handlers::api_schema))
        .route("/api/metrics", get(handlers::api_metrics))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inference::tests::{SlowClassifier, StubClassifier};
    use crate::models::inference::Classifier;
    use crate::models::loader::LoadedModel;
    use crate::types::record::FeatureSchema;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    fn state_with(classifier: Box<dyn Classifier>) -> AppState {
        let schema = FeatureSchema::new(vec!["Glucose".to_string(), "BMI".to_string()]).unwrap();
        let pipeline =
            PredictionPipeline::new(Arc::new(LoadedModel::new(classifier, schema, "Outcome")));
        AppState::new(pipeline, &AppConfig::default(), Arc::new(PredictionMetrics::new()))
    }

    fn state(probability: f64) -> AppState {
        state_with(Box::new(StubClassifier {
            probability,
            threshold: 0.5,
        }))
    }

    fn cookie_of(response: &Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn json_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn form_request(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(state(0.82));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"], "stub");
    }

    #[tokio::test]
    async fn test_api_predict_positive() {
        let state = state(0.82);
        let metrics = state.metrics.clone();
        let app = create_router(state);

        let response = app
            .oneshot(json_request(
                "/api/predict",
                r#"{"features": {"Glucose": 150.0, "BMI": 30.0}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["label"], 1);
        assert_eq!(body["probability"], 0.82);
        assert_eq!(body["percentage"], "82.00%");
        assert_eq!(body["outcome"], "risk_detected");
        assert_eq!(body["target"], "Outcome");
        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_api_predict_negative() {
        let app = create_router(state(0.10));
        let response = app
            .oneshot(json_request(
                "/api/predict",
                r#"{"features": {"Glucose": 80.0, "BMI": 22.0}}"#,
            ))
            .await
            .unwrap();

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["label"], 0);
        assert_eq!(body["percentage"], "10.00%");
        assert_eq!(body["outcome"], "no_risk_detected");
    }

    #[tokio::test]
    async fn test_api_predict_rejects_invalid_records() {
        let state = state(0.82);
        let metrics = state.metrics.clone();
        let app = create_router(state);

        for body in [
            r#"{"features": {"Glucose": 150.0}}"#,
            r#"{"features": {"Glucose": -1.0, "BMI": 30.0}}"#,
            r#"{"features": {"Glucose": 501.0, "BMI": 30.0}}"#,
        ] {
            let response = app.clone().oneshot(json_request("/api/predict", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{body}");
        }
        assert_eq!(metrics.rejections.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_api_schema() {
        let app = create_router(state(0.82));
        let response = app
            .oneshot(Request::builder().uri("/api/schema").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["features"], serde_json::json!(["Glucose", "BMI"]));
        assert_eq!(body["fields"][1]["default"], 25.0);
    }

    #[tokio::test]
    async fn test_browser_flow() {
        let state = state(0.82);
        let sessions = state.sessions.clone();
        let app = create_router(state);

        // name gate issues a session cookie
        let response = app
            .clone()
            .oneshot(form_request("/name", None, "name=Ayesha"))
            .await
            .unwrap();
        let cookie = cookie_of(&response);
        let html = body_text(response).await;
        assert!(html.contains("Hi! Ayesha, Welcome to Diabetes Prediction App"));
        assert_eq!(sessions.len(), 1);

        let response = app
            .clone()
            .oneshot(form_request("/predict", Some(&cookie), "Glucose=150&BMI=30"))
            .await
            .unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let html = body_text(response).await;
        assert!(html.contains("82.00%"));
        assert!(html.contains("The model predicts that you may have diabetes."));

        let response = app
            .clone()
            .oneshot(form_request("/predict", Some(&cookie), "Glucose=501&BMI=30"))
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("Glucose must be between 0 and 500, got 501"));
        assert!(!html.contains("Prediction Results"));

        let response = app
            .oneshot(form_request("/reset", Some(&cookie), ""))
            .await
            .unwrap();
        let html = body_text(response).await;
        assert!(html.contains("action=\"/name\""));
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_blank_name_shows_warning() {
        let state = state(0.82);
        let sessions = state.sessions.clone();
        let app = create_router(state);
        let response = app
            .oneshot(form_request("/name", None, "name=+++"))
            .await
            .unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let html = body_text(response).await;
        assert!(html.contains("Please enter a valid name before proceeding."));
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_cookieless_visits_store_no_session() {
        let state = state(0.82);
        let sessions = state.sessions.clone();
        let app = create_router(state);

        for _ in 0..50 {
            let response = app
                .clone()
                .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get(header::SET_COOKIE).is_none());
        }
        assert_eq!(sessions.len(), 0);
    }

    #[tokio::test]
    async fn test_reset_during_slow_prediction_wins() {
        let state = state_with(Box::new(SlowClassifier {
            probability: 0.82,
            delay: Duration::from_millis(300),
        }));
        let sessions = state.sessions.clone();
        let metrics = state.metrics.clone();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(form_request("/name", None, "name=Ayesha"))
            .await
            .unwrap();
        let cookie = cookie_of(&response);

        let predicting = tokio::spawn(
            app.clone()
                .oneshot(form_request("/predict", Some(&cookie), "Glucose=150&BMI=30")),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        let response = app
            .clone()
            .oneshot(form_request("/reset", Some(&cookie), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(sessions.is_empty());

        let response = predicting.await.unwrap().unwrap();
        let html = body_text(response).await;
        assert!(html.contains("action=\"/name\""));
        assert!(!html.contains("Prediction Results"));
        assert!(sessions.is_empty());
        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 0);

        // the name gate is what the user sees next
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::COOKIE, cookie.as_str())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(body_text(response).await.contains("action=\"/name\""));
    }

    #[tokio::test]
    async fn test_api_predict_malformed_payload_is_json_error() {
        let state = state(0.82);
        let metrics = state.metrics.clone();
        let app = create_router(state);

        let response = app
            .oneshot(json_request(
                "/api/predict",
                r#"{"features": {"Glucose": "abc", "BMI": 30.0}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], 422);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
        assert_eq!(metrics.rejections.load(Ordering::Relaxed), 1);
    }
}

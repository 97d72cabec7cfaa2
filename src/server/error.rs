//! JSON API errors

use crate::error::{InferenceError, PredictError, ValidationError};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// Body is not a JSON prediction request
    Payload(JsonRejection),
    Validation(ValidationError),
    Inference(InferenceError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Payload(rejection)
    }
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Validation(e) => ApiError::Validation(e),
            PredictError::Inference(e) => ApiError::Inference(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Payload(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::Inference(e @ InferenceError::Timeout(_)) => {
                tracing::error!(error = %e, "Inference timed out");
                (StatusCode::GATEWAY_TIMEOUT, e.to_string())
            }
            ApiError::Inference(e) => {
                tracing::error!(error = %e, "Inference failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}


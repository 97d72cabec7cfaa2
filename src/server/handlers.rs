//! Request handlers: browser form actions and the JSON API

use super::error::{ApiError, ApiResult};
use super::sessions::{session_cookie, session_id};
use super::AppState;
use crate::form::FieldSpec;
use crate::pipeline::run_blocking;
use crate::render;
use crate::session::{Event, SessionState, Stage, Submission, View};
use crate::types::prediction::Outcome;
use crate::types::record::InputRecord;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ============================================================================
// BROWSER FORM
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NameForm {
    #[serde(default)]
    pub name: String,
}

pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    dispatch(&state, &headers, Event::Show).await
}

pub async fn submit_name(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<NameForm>,
) -> Response {
    dispatch(&state, &headers, Event::SubmitName(form.name)).await
}

pub async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(raw): Form<HashMap<String, String>>,
) -> Response {
    dispatch(&state, &headers, Event::Predict(raw)).await
}

pub async fn reset(State(state): State<AppState>, headers: HeaderMap) -> Response {
    dispatch(&state, &headers, Event::Reset).await
}

/// Apply one event to the caller's session and render the resulting view.
///
/// A session is stored only once it leaves the initial state, and removed
/// when it returns to it. If another request changed the session while this
/// one was scoring, the stale transition is dropped and the current screen
/// is rendered instead.
async fn dispatch(state: &AppState, headers: &HeaderMap, event: Event) -> Response {
    let existing = session_id(headers);
    let stored = existing.and_then(|id| state.sessions.get(&id));
    let current = stored.clone().unwrap_or_default();

    // reset always wins, even over a prediction still in flight
    if event == Event::Reset {
        if let Some(id) = existing {
            state.sessions.remove(&id);
        }
        let (_, view) = current.handle(Event::Reset, &state.pipeline, &state.policy);
        return Html(render::page(&view, &state.page)).into_response();
    }

    let started = Instant::now();
    let (next, mut view) = match event {
        Event::Predict(raw) if current.stage == Stage::AwaitingInput => {
            predict_in_session(state, current, raw).await
        }
        event => current.handle(event, &state.pipeline, &state.policy),
    };

    let id = existing.unwrap_or_else(Uuid::new_v4);
    let stores = next != SessionState::default();

    let committed = state.sessions.commit(id, stored.as_ref(), next);
    if committed {
        if let Some(submission) = view.submission() {
            state.metrics.record_submission(submission, started.elapsed());
            log_submission(&id, submission);
        }
    } else {
        debug!(session = %id, "Session changed during request, dropping stale transition");
        let actual = state.sessions.get(&id).unwrap_or_default();
        view = actual.current_view(&state.pipeline, &state.policy);
    }

    let mut response = Html(render::page(&view, &state.page)).into_response();
    if existing.is_none() && committed && stores {
        response
            .headers_mut()
            .insert(header::SET_COOKIE, session_cookie(&id));
    }
    response
}

/// Run the predict transition on the blocking pool, bounded by the inference timeout
async fn predict_in_session(
    state: &AppState,
    current: SessionState,
    raw: HashMap<String, String>,
) -> (SessionState, View) {
    let pipeline = state.pipeline.clone();
    let policy = state.policy.clone();
    let session = current.clone();
    let values = raw.clone();

    let outcome = run_blocking(state.timeout, state.pipeline.model_name(), move || {
        session.handle(Event::Predict(values), &pipeline, &policy)
    })
    .await;

    match outcome {
        Ok(transition) => transition,
        Err(e) => {
            let view = current.form_view(&state.pipeline, &state.policy, raw, Submission::from(Err(e)));
            (current, view)
        }
    }
}

fn log_submission(id: &Uuid, submission: &Submission) {
    match submission {
        Submission::None => {}
        Submission::Scored(result) => info!(
            session = %id,
            label = result.label,
            probability = result.probability,
            "Prediction served"
        ),
        Submission::Rejected(e) => debug!(session = %id, error = %e, "Submission rejected"),
        Submission::Failed(e) => warn!(session = %id, error = %e, "Prediction failed"),
    }
}

// ============================================================================
// JSON API
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub features: InputRecord,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction_id: Uuid,
    pub label: u8,
    pub probability: f64,
    pub percentage: String,
    pub outcome: Outcome,
    pub headline: &'static str,
    pub advice: &'static [&'static str],
    pub target: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

pub async fn api_predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<Json<PredictResponse>> {
    let started = Instant::now();

    let Json(request) = payload.map_err(|rejection| {
        state.metrics.record_rejection();
        debug!(error = %rejection.body_text(), "API payload rejected");
        ApiError::from(rejection)
    })?;

    if let Err(e) = state.policy.validate(state.pipeline.schema(), &request.features) {
        state.metrics.record_rejection();
        debug!(error = %e, "API submission rejected");
        return Err(ApiError::Validation(e));
    }

    let result = match state
        .pipeline
        .predict_with_timeout(request.features, state.timeout)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            state.metrics.record_submission(&Submission::from(Err(e.clone())), started.elapsed());
            return Err(e.into());
        }
    };

    let elapsed = started.elapsed();
    state
        .metrics
        .record_prediction(elapsed, result.probability, result.label);

    let response = PredictResponse {
        prediction_id: Uuid::new_v4(),
        label: result.label,
        probability: result.probability,
        percentage: result.formatted_percentage(),
        outcome: result.outcome(),
        headline: result.outcome().headline(),
        advice: result.outcome().advice(),
        target: state.pipeline.target().to_string(),
        model: state.pipeline.model_name().to_string(),
        created_at: Utc::now(),
    };

    info!(
        prediction_id = %response.prediction_id,
        label = response.label,
        probability = response.probability,
        processing_time_us = elapsed.as_micros(),
        "API prediction served"
    );

    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub features: Vec<String>,
    pub target: String,
    pub model: String,
    pub fields: Vec<FieldSpec>,
}

pub async fn api_schema(State(state): State<AppState>) -> Json<SchemaResponse> {
    Json(SchemaResponse {
        features: state.pipeline.schema().names().to_vec(),
        target: state.pipeline.target().to_string(),
        model: state.pipeline.model_name().to_string(),
        fields: state.policy.fields(state.pipeline.schema()),
    })
}

pub async fn api_metrics(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.metrics.snapshot()))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model_loaded": true,
        "model": state.pipeline.model_name(),
        "sessions": state.sessions.len(),
    }))
}

//! HTTP surface: the create-new-case callback, the envelope delivery
//! adapter, and a health probe.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::callback::{CallbackRequest, CreateCaseCallbackService};
use crate::error::CallbackError;
use crate::model::case::CaseData;
use crate::queue::{Disposition, EnvelopeProcessor};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub callback_service: Arc<CreateCaseCallbackService>,
    pub envelope_processor: Arc<EnvelopeProcessor>,
}

/// Build the axum router.
pub fn routes(
    callback_service: Arc<CreateCaseCallbackService>,
    envelope_processor: Arc<EnvelopeProcessor>,
) -> Router {
    let state = AppState {
        callback_service,
        envelope_processor,
    };

    Router::new()
        .route("/health", get(health))
        .route("/callback/create-new-case", post(create_new_case))
        .route("/envelopes", post(deliver_envelope))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "scan-orchestrator"
    }))
}

// ── Callback ────────────────────────────────────────────────────────

/// Wire shape of a callback response. `data` is present only when the
/// callback produced finalized case data.
#[derive(Debug, Serialize)]
struct CallbackResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<CaseData>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

async fn create_new_case(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CallbackRequest>,
) -> impl IntoResponse {
    let idam_token = header_value(&headers, "Authorization");
    let user_id = header_value(&headers, "user-id");

    info!(event_id = %request.event_id, "Received create-new-case callback");

    match state
        .callback_service
        .process(&request, idam_token, user_id)
        .await
    {
        Ok(result) => {
            let data = if result.errors.is_empty() {
                Some(result.exception_record_data)
            } else {
                None
            };
            (
                StatusCode::OK,
                Json(CallbackResponse {
                    data,
                    warnings: result.warnings,
                    errors: result.errors,
                }),
            )
        }
        Err(e) => {
            let status = match e {
                CallbackError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            (
                status,
                Json(CallbackResponse {
                    data: None,
                    warnings: vec![],
                    errors: vec![e.to_string()],
                }),
            )
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

// ── Envelope delivery ───────────────────────────────────────────────

async fn deliver_envelope(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let disposition = state.envelope_processor.process(&body).await;
    let (status, label) = match disposition {
        Disposition::Complete => (StatusCode::OK, "complete"),
        Disposition::Retry => (StatusCode::SERVICE_UNAVAILABLE, "retry"),
        Disposition::DeadLetter => (StatusCode::UNPROCESSABLE_ENTITY, "deadLetter"),
    };
    (status, Json(serde_json::json!({ "disposition": label })))
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::jobs::error::JobError;
use crate::jobs::types::{Job, JobStatus, ResultPayload};
use crate::AppContext;

pub mod audio;
pub mod status;
pub mod synthesize;
pub mod transcribe;


pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe::transcribe))
        .route("/transcribeAsync", post(transcribe::transcribe_async))
        .route("/textToAudio", post(synthesize::text_to_audio))
        .route("/textToAudioAsync", post(synthesize::text_to_audio_async))
        .route("/taskStatus", get(status::task_status))
        .route("/health", get(status::health))
        .route("/audio/:name", get(audio::serve_audio))
        .with_state(ctx)
}

/// Submission-time rejection: only validation and overload reach the
/// caller directly, everything else flows through the job record.
pub(crate) fn rejection(err: &JobError) -> Response {
    let code = match err {
        JobError::Validation(_) => StatusCode::BAD_REQUEST,
        JobError::Overload => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = json!({
        "status": "error",
        "error": err.to_string(),
        "error_kind": err.kind(),
    });
    (code, Json(body)).into_response()
}

/// Inline (synchronous) terminal response: the result payload with a
/// status code derived from the failure class, if any.
pub(crate) fn terminal(job: &Job) -> Response {
    let payload = ResultPayload::from_job(job);
    let code = if job.status == JobStatus::Failed {
        match payload.error_kind.as_deref() {
            Some("fetch_error") | Some("conversion_error") | Some("duration_exceeded") => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Some("processing_timeout") => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    } else {
        StatusCode::OK
    };
    (code, Json(payload)).into_response()
}

pub(crate) fn accepted(job: &Job) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "started", "id": job.id })),
    )
        .into_response()
}

use axum::{extract::State, response::Response, Json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::jobs::types::JobInput;
use crate::web::handlers::{accepted, rejection, terminal};
use crate::AppContext;

// Required fields are deserialized as Option so an absent field reaches
// admission validation and comes back as a 400, not an extractor reject.
#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub audio_url: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranscribeAsyncRequest {
    pub audio_url: Option<String>,
    pub owner: Option<String>,
    pub webhook_url: Option<String>,
}

/// Synchronous transcription: the pipeline runs on this request and the
/// terminal result comes back inline.
pub async fn transcribe(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<TranscribeRequest>,
) -> Response {
    let input = JobInput::RemoteAudio {
        url: req.audio_url.unwrap_or_default(),
    };
    let job = match ctx.gate.submit_inline(input, req.owner.unwrap_or_default()).await {
        Ok(job) => job,
        Err(e) => return rejection(&e),
    };

    let job = ctx.runner.execute_inline(job).await;
    terminal(&job)
}

/// Asynchronous transcription: 202 on admission, result via webhook
/// and/or `/taskStatus`.
pub async fn transcribe_async(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<TranscribeAsyncRequest>,
) -> Response {
    let input = JobInput::RemoteAudio {
        url: req.audio_url.unwrap_or_default(),
    };
    match ctx
        .gate
        .submit_queued(input, req.owner.unwrap_or_default(), req.webhook_url)
        .await
    {
        Ok(job) => {
            info!("Accepted async transcription {}", job.id);
            accepted(&job)
        }
        Err(e) => rejection(&e),
    }
}

use axum::{extract::State, response::Response, Json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::jobs::types::{JobInput, SynthesisParams};
use crate::web::handlers::{accepted, rejection, terminal};
use crate::AppContext;

// Required fields are deserialized as Option so an absent field reaches
// admission validation and comes back as a 400, not an extractor reject.
#[derive(Debug, Deserialize)]
pub struct TextToAudioRequest {
    pub text: Option<String>,
    pub owner: Option<String>,
    #[serde(default)]
    pub tts_params: Option<SynthesisParams>,
}

#[derive(Debug, Deserialize)]
pub struct TextToAudioAsyncRequest {
    pub text: Option<String>,
    pub owner: Option<String>,
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub tts_params: Option<SynthesisParams>,
}

pub async fn text_to_audio(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<TextToAudioRequest>,
) -> Response {
    let input = JobInput::Text {
        text: req.text.unwrap_or_default(),
        params: req.tts_params.unwrap_or_default(),
    };
    let job = match ctx.gate.submit_inline(input, req.owner.unwrap_or_default()).await {
        Ok(job) => job,
        Err(e) => return rejection(&e),
    };

    let job = ctx.runner.execute_inline(job).await;
    terminal(&job)
}

pub async fn text_to_audio_async(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<TextToAudioAsyncRequest>,
) -> Response {
    let input = JobInput::Text {
        text: req.text.unwrap_or_default(),
        params: req.tts_params.unwrap_or_default(),
    };
    match ctx
        .gate
        .submit_queued(input, req.owner.unwrap_or_default(), req.webhook_url)
        .await
    {
        Ok(job) => {
            info!("Accepted async synthesis {}", job.id);
            accepted(&job)
        }
        Err(e) => rejection(&e),
    }
}

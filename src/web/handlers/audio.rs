use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::Path as FsPath;

use crate::media::AudioFormat;
use crate::AUDIO_PATH;

/// Serves a retained output artifact. Once the sweeper reclaims a file
/// this starts returning 404 without any restart.
pub async fn serve_audio(Path(name): Path<String>) -> Response {
    if !is_safe_name(&name) {
        return not_found();
    }

    let path = FsPath::new(AUDIO_PATH.as_str()).join(&name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => return not_found(),
    };

    let content_type = FsPath::new(&name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(AudioFormat::from_extension)
        .map(|fmt| fmt.content_type())
        .unwrap_or("application/octet-stream");

    ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "error", "error": "audio not found" })),
    )
        .into_response()
}

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::AppContext;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub id: String,
}

pub async fn task_status(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<StatusQuery>,
) -> Response {
    match ctx.store.get(&query.id).await {
        Some(view) => (StatusCode::OK, Json(view)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "error": "task not found" })),
        )
            .into_response(),
    }
}

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Response {
    let stats = ctx.store.stats().await;
    let body = json!({
        "status": "ok",
        "model": "ready",
        "version": env!("GIT_HASH"),
        "workers": ctx.settings.workers,
        "max_active": ctx.settings.max_active,
        "active_jobs": stats.queued + stats.processing,
        "jobs": stats,
    });
    (StatusCode::OK, Json(body)).into_response()
}

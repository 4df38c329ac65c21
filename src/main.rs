#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use speech_rs::engine::espeak::EspeakSynthesizer;
use speech_rs::engine::whisper::WhisperRecognizer;
use speech_rs::jobs::{
    AdmissionGate, JobRunner, JobStore, Pipeline, RetentionSweeper, WebhookDispatcher, WorkerPool,
};
use speech_rs::media::FfmpegMedia;
use speech_rs::utils::logger;
use speech_rs::{AppContext, Settings, AUDIO_PATH, LISTEN_PORT, MODEL_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = logger::init("./logs".to_string())?;

    speech_rs::init_env();
    let settings = Arc::new(Settings::default());

    info!("Starting speech service (build {})...", env!("GIT_HASH"));

    info!("Loading recognition model from {}...", MODEL_PATH.as_str());
    let recognizer = Arc::new(WhisperRecognizer::new(MODEL_PATH.to_string())?);
    let synthesizer = Arc::new(EspeakSynthesizer::new());

    let store = Arc::new(JobStore::new(settings.max_records));
    let (queue_tx, queue_rx) = mpsc::channel(settings.max_active);
    let gate = Arc::new(AdmissionGate::new(store.clone(), queue_tx, settings.max_active));

    let output_dir = PathBuf::from(AUDIO_PATH.as_str());
    let pipeline = Pipeline::new(
        recognizer,
        synthesizer,
        Arc::new(FfmpegMedia),
        output_dir.clone(),
        settings.clone(),
    );
    let webhook = WebhookDispatcher::new(settings.webhook_timeout, settings.webhook_attempts)?;
    let runner = Arc::new(JobRunner::new(store.clone(), pipeline, webhook));

    info!("Spawning {} workers...", settings.workers);
    let pool = WorkerPool::new(runner.clone(), queue_rx);
    pool.spawn_workers(settings.workers).await;

    let sweeper = RetentionSweeper::new(output_dir, settings.retention, settings.sweep_interval);
    tokio::spawn(sweeper.run());

    let ctx = Arc::new(AppContext {
        store,
        gate,
        runner,
        settings,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], *LISTEN_PORT));
    info!("Starting HTTP server at http://{}", addr);

    match speech_rs::web::start_server(ctx, addr).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}

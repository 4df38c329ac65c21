pub mod engine;
pub mod jobs;
pub mod media;
pub mod utils;
pub mod web;

use std::{env, sync::Arc, time::Duration};

use jobs::gate::AdmissionGate;
use jobs::store::JobStore;
use jobs::worker::JobRunner;
use once_cell::sync::Lazy;

pub struct AppContext {
    pub store: Arc<JobStore>,
    pub gate: Arc<AdmissionGate>,
    pub runner: Arc<JobRunner>,
    pub settings: Arc<Settings>,
}

const SPEECH_AUDIO_PATH: &str = "./speech_data/audio/";
const SPEECH_MODEL_PATH: &str = "./models/ggml-base.bin";
const LISTEN_PORT_DEFAULT: u16 = 7200;

pub static AUDIO_PATH: Lazy<String> = Lazy::new(|| {
    match env::var("SPEECH_AUDIO_PATH") {
        Ok(path) => path,
        Err(_) => dotenv::var("SPEECH_AUDIO_PATH").unwrap_or_else(|_| SPEECH_AUDIO_PATH.to_string()),
    }
});

pub static MODEL_PATH: Lazy<String> = Lazy::new(|| {
    match env::var("SPEECH_MODEL_PATH") {
        Ok(path) => path,
        Err(_) => dotenv::var("SPEECH_MODEL_PATH").unwrap_or_else(|_| SPEECH_MODEL_PATH.to_string()),
    }
});

pub static LISTEN_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("PORT")
        .or_else(|_| dotenv::var("PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(LISTEN_PORT_DEFAULT)
});

/// Process-wide tuning knobs, built once at startup and read-only after.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Admission ceiling: max jobs Queued + Processing at once.
    pub max_active: usize,
    /// Number of pipeline workers. Must not exceed `max_active`.
    pub workers: usize,
    /// Max records kept in the job store before terminal eviction.
    pub max_records: usize,
    /// Inputs longer than this fail before recognition starts.
    pub max_audio_secs: f64,
    /// Per-job wall-clock processing deadline.
    pub deadline: Duration,
    /// Samples fed to the recognizer per chunk (16 kHz mono).
    pub chunk_samples: usize,
    pub webhook_timeout: Duration,
    pub webhook_attempts: u32,
    pub retention: Duration,
    pub sweep_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_active: 16,
            workers: 4,
            max_records: 4096,
            max_audio_secs: 600.0,
            deadline: Duration::from_secs(300),
            chunk_samples: 4000,
            webhook_timeout: Duration::from_secs(10),
            webhook_attempts: 3,
            retention: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

pub fn init_env() {
    dotenv::dotenv().ok();

    std::fs::create_dir_all(AUDIO_PATH.as_str()).unwrap_or_else(|e| {
        eprintln!("Failed to create audio directory: {}", e);
    });
}

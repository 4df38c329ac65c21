use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::{extract::Json, routing::post, Router};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::engine::{Recognizer, RecognizerStream, Synthesizer, VoiceOptions};
use crate::jobs::gate::AdmissionGate;
use crate::jobs::pipeline::Pipeline;
use crate::jobs::store::JobStore;
use crate::jobs::types::{JobInput, JobResult, JobStatus, JobView, SynthesisParams};
use crate::jobs::webhook::WebhookDispatcher;
use crate::jobs::worker::{JobRunner, WorkerPool};
use crate::media::{MediaAdapter, ToolError};
use crate::Settings;

// ---- mock collaborators ----------------------------------------------------

pub(crate) struct MockMedia {
    duration: f64,
    sample_count: usize,
    scratch_seen: Mutex<Option<PathBuf>>,
}

impl MockMedia {
    pub(crate) fn new(duration: f64, sample_count: usize) -> Self {
        Self {
            duration,
            sample_count,
            scratch_seen: Mutex::new(None),
        }
    }

    fn scratch_path(&self) -> Option<PathBuf> {
        self.scratch_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaAdapter for MockMedia {
    async fn fetch(&self, _url: &str, dest_dir: &Path, _limit: Duration) -> Result<PathBuf, ToolError> {
        *self.scratch_seen.lock().unwrap() = Some(dest_dir.to_path_buf());
        let path = dest_dir.join("input.raw");
        std::fs::write(&path, b"raw").map_err(|e| ToolError::Io(e.to_string()))?;
        Ok(path)
    }

    async fn normalize(&self, input: &Path, _limit: Duration) -> Result<PathBuf, ToolError> {
        let output = input.with_extension("norm.wav");
        std::fs::write(&output, b"wav").map_err(|e| ToolError::Io(e.to_string()))?;
        Ok(output)
    }

    async fn probe_duration(&self, _wav: &Path) -> Result<f64> {
        Ok(self.duration)
    }

    async fn load_samples(&self, _wav: &Path) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.sample_count])
    }

    async fn post_process(
        &self,
        _input: &Path,
        _params: &SynthesisParams,
        output: &Path,
        _limit: Duration,
    ) -> Result<(), ToolError> {
        std::fs::write(output, b"audio").map_err(|e| ToolError::Io(e.to_string()))
    }
}

#[derive(Default)]
struct StreamGauge {
    current: AtomicUsize,
    max: AtomicUsize,
    opened: AtomicUsize,
}

pub(crate) struct MockRecognizer {
    partials: Vec<String>,
    final_text: Option<String>,
    chunk_delay: Duration,
    gauge: Arc<StreamGauge>,
}

impl MockRecognizer {
    pub(crate) fn silent() -> Self {
        Self {
            partials: Vec::new(),
            final_text: None,
            chunk_delay: Duration::ZERO,
            gauge: Arc::new(StreamGauge::default()),
        }
    }

    fn speaking(partials: &[&str], final_text: Option<&str>) -> Self {
        Self {
            partials: partials.iter().map(|s| s.to_string()).collect(),
            final_text: final_text.map(|s| s.to_string()),
            chunk_delay: Duration::ZERO,
            gauge: Arc::new(StreamGauge::default()),
        }
    }

    fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

#[async_trait]
impl Recognizer for MockRecognizer {
    async fn open_stream(&self, _lang: Option<String>) -> Result<Box<dyn RecognizerStream>> {
        self.gauge.opened.fetch_add(1, Ordering::SeqCst);
        let current = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.max.fetch_max(current, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            remaining: self.partials.clone().into(),
            final_text: self.final_text.clone(),
            delay: self.chunk_delay,
            gauge: self.gauge.clone(),
        }))
    }
}

struct MockStream {
    remaining: VecDeque<String>,
    final_text: Option<String>,
    delay: Duration,
    gauge: Arc<StreamGauge>,
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecognizerStream for MockStream {
    async fn accept_chunk(&mut self, _samples: &[f32]) -> Result<Option<String>> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        Ok(self.remaining.pop_front())
    }

    async fn finalize(&mut self) -> Result<Option<String>> {
        Ok(self.final_text.take())
    }
}

struct MockSynthesizer;

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: &VoiceOptions, output: &Path) -> Result<()> {
        std::fs::write(output, b"wav")?;
        Ok(())
    }
}

// ---- harness ---------------------------------------------------------------

pub(crate) struct Harness {
    pub(crate) store: Arc<JobStore>,
    pub(crate) gate: Arc<AdmissionGate>,
    pub(crate) runner: Arc<JobRunner>,
    pub(crate) queue_rx: Option<mpsc::Receiver<String>>,
    pub(crate) output_dir: tempfile::TempDir,
}

pub(crate) fn harness(
    settings: Settings,
    media: Arc<dyn MediaAdapter>,
    recognizer: Arc<dyn Recognizer>,
    webhook: WebhookDispatcher,
) -> Harness {
    let settings = Arc::new(settings);
    let store = Arc::new(JobStore::new(settings.max_records));
    let (tx, rx) = mpsc::channel(settings.max_active);
    let gate = Arc::new(AdmissionGate::new(store.clone(), tx, settings.max_active));
    let output_dir = tempfile::tempdir().unwrap();

    let pipeline = Pipeline::new(
        recognizer,
        Arc::new(MockSynthesizer),
        media,
        output_dir.path().to_path_buf(),
        settings,
    );
    let runner = Arc::new(JobRunner::new(store.clone(), pipeline, webhook));

    Harness {
        store,
        gate,
        runner,
        queue_rx: Some(rx),
        output_dir,
    }
}

pub(crate) fn default_webhook() -> WebhookDispatcher {
    WebhookDispatcher::new(Duration::from_millis(500), 1).unwrap()
}

fn audio_input() -> JobInput {
    JobInput::RemoteAudio {
        url: "http://example.com/clip.wav".to_string(),
    }
}

async fn wait_terminal(store: &JobStore, id: &str) -> JobView {
    for _ in 0..250 {
        if let Some(view) = store.get(id).await {
            if view.status.is_terminal() {
                return view;
            }
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} never reached a terminal state", id);
}

/// Delivery outcome lands just after the terminal record; poll for it.
async fn wait_webhook_resolved(store: &JobStore, id: &str) -> bool {
    for _ in 0..250 {
        if let Some(view) = store.get(id).await {
            if let Some(delivered) = view.webhook_delivered {
                return delivered;
            }
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("webhook delivery for job {} never resolved", id);
}

/// Local capture endpoint standing in for a caller's webhook receiver.
async fn capture_server() -> (String, mpsc::Receiver<serde_json::Value>) {
    let (tx, rx) = mpsc::channel(8);
    let app = Router::new().route(
        "/cb",
        post(move |Json(value): Json<serde_json::Value>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(value).await;
                "ok"
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/cb", addr), rx)
}

// ---- lifecycle tests -------------------------------------------------------

#[tokio::test]
async fn sync_silent_clip_completes_with_empty_transcript() {
    let h = harness(
        Settings::default(),
        Arc::new(MockMedia::new(2.0, 8000)),
        Arc::new(MockRecognizer::silent()),
        default_webhook(),
    );

    let job = h
        .gate
        .submit_inline(audio_input(), "u1".to_string())
        .await
        .unwrap();
    let job = h.runner.execute_inline(job).await;

    assert_eq!(job.status, JobStatus::Completed);
    match job.result.unwrap() {
        JobResult::Transcript { text, is_full, audio_duration } => {
            assert_eq!(text, "");
            assert!(!is_full);
            assert!((audio_duration - 2.0).abs() < 1e-9);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn transcript_joins_partials_and_final() {
    let settings = Settings {
        chunk_samples: 1000,
        ..Settings::default()
    };
    let h = harness(
        settings,
        Arc::new(MockMedia::new(2.0, 3000)),
        Arc::new(MockRecognizer::speaking(&["hello", "world"], Some("again"))),
        default_webhook(),
    );

    let job = h
        .gate
        .submit_inline(audio_input(), "u1".to_string())
        .await
        .unwrap();
    let job = h.runner.execute_inline(job).await;

    assert_eq!(job.status, JobStatus::Completed);
    match job.result.unwrap() {
        JobResult::Transcript { text, is_full, .. } => {
            assert_eq!(text, "hello world again");
            assert!(is_full);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn over_long_input_fails_before_recognition() {
    let settings = Settings {
        max_audio_secs: 5.0,
        ..Settings::default()
    };
    let recognizer = Arc::new(MockRecognizer::silent());
    let gauge = recognizer.gauge.clone();
    let h = harness(
        settings,
        Arc::new(MockMedia::new(10.0, 160000)),
        recognizer,
        default_webhook(),
    );

    let job = h
        .gate
        .submit_inline(audio_input(), "u1".to_string())
        .await
        .unwrap();
    let job = h.runner.execute_inline(job).await;

    assert_eq!(job.status, JobStatus::Failed);
    match job.result.unwrap() {
        JobResult::Error(failure) => assert_eq!(failure.kind, "duration_exceeded"),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(gauge.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn deadline_breach_fails_job_and_cleans_artifacts() {
    let settings = Settings {
        deadline: Duration::from_millis(120),
        chunk_samples: 100,
        ..Settings::default()
    };
    let media = Arc::new(MockMedia::new(2.0, 2000));
    let h = harness(
        settings,
        media.clone(),
        Arc::new(MockRecognizer::silent().with_chunk_delay(Duration::from_millis(50))),
        default_webhook(),
    );

    let job = h
        .gate
        .submit_inline(audio_input(), "u1".to_string())
        .await
        .unwrap();
    let job = h.runner.execute_inline(job).await;

    assert_eq!(job.status, JobStatus::Failed);
    match job.result.unwrap() {
        JobResult::Error(failure) => assert_eq!(failure.kind, "processing_timeout"),
        other => panic!("unexpected result: {:?}", other),
    }

    // the scratch dir the pipeline worked in is gone
    let scratch = media.scratch_path().expect("fetch never ran");
    assert!(!scratch.exists());
}

#[tokio::test]
async fn async_synthesis_delivers_webhook() {
    let (callback_url, mut received) = capture_server().await;
    let mut h = harness(
        Settings::default(),
        Arc::new(MockMedia::new(1.0, 1000)),
        Arc::new(MockRecognizer::silent()),
        default_webhook(),
    );

    let pool = WorkerPool::new(h.runner.clone(), h.queue_rx.take().unwrap());
    pool.spawn_workers(2).await;

    let job = h
        .gate
        .submit_queued(
            JobInput::Text {
                text: "Hello".to_string(),
                params: SynthesisParams::default(),
            },
            "u2".to_string(),
            Some(callback_url),
        )
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);

    let view = wait_terminal(&h.store, &job.id).await;
    assert_eq!(view.status, JobStatus::Completed);

    let payload = tokio::time::timeout(Duration::from_secs(5), received.recv())
        .await
        .expect("webhook never arrived")
        .unwrap();
    assert_eq!(payload["status"], "success");
    assert_eq!(payload["id"], job.id);
    assert_eq!(payload["owner"], "u2");
    let audio_url = payload["audio_url"].as_str().unwrap();
    assert!(audio_url.starts_with("/audio/"));

    // the retained artifact actually exists under the output dir
    let name = audio_url.trim_start_matches("/audio/");
    assert!(h.output_dir.path().join(name).exists());

    assert!(wait_webhook_resolved(&h.store, &job.id).await);
}

#[tokio::test]
async fn webhook_failure_never_blocks_other_jobs() {
    let (good_url, mut received) = capture_server().await;
    let mut h = harness(
        Settings::default(),
        Arc::new(MockMedia::new(1.0, 1000)),
        Arc::new(MockRecognizer::speaking(&[], Some("ok"))),
        WebhookDispatcher::new(Duration::from_millis(200), 1).unwrap(),
    );

    let pool = WorkerPool::new(h.runner.clone(), h.queue_rx.take().unwrap());
    pool.spawn_workers(1).await;

    // first job pushes to a dead endpoint, second to the capture server
    let dead = h
        .gate
        .submit_queued(audio_input(), "u1".to_string(), Some("http://127.0.0.1:9/cb".to_string()))
        .await
        .unwrap();
    let live = h
        .gate
        .submit_queued(audio_input(), "u1".to_string(), Some(good_url))
        .await
        .unwrap();

    let dead_view = wait_terminal(&h.store, &dead.id).await;
    let live_view = wait_terminal(&h.store, &live.id).await;
    assert_eq!(dead_view.status, JobStatus::Completed);
    assert_eq!(live_view.status, JobStatus::Completed);

    let payload = tokio::time::timeout(Duration::from_secs(5), received.recv())
        .await
        .expect("second webhook never arrived")
        .unwrap();
    assert_eq!(payload["id"], live.id);

    assert!(!wait_webhook_resolved(&h.store, &dead.id).await);
    assert!(wait_webhook_resolved(&h.store, &live.id).await);
}

#[tokio::test]
async fn worker_pool_bounds_concurrent_processing() {
    let recognizer = Arc::new(
        MockRecognizer::silent().with_chunk_delay(Duration::from_millis(30)),
    );
    let gauge = recognizer.gauge.clone();
    let settings = Settings {
        chunk_samples: 500,
        ..Settings::default()
    };
    let mut h = harness(
        settings,
        Arc::new(MockMedia::new(1.0, 2000)),
        recognizer,
        default_webhook(),
    );

    let pool = WorkerPool::new(h.runner.clone(), h.queue_rx.take().unwrap());
    pool.spawn_workers(2).await;

    let mut ids = Vec::new();
    for _ in 0..6 {
        let job = h
            .gate
            .submit_queued(audio_input(), "u1".to_string(), None)
            .await
            .unwrap();
        ids.push(job.id);
    }
    for id in &ids {
        let view = wait_terminal(&h.store, id).await;
        assert_eq!(view.status, JobStatus::Completed);
    }

    assert_eq!(gauge.opened.load(Ordering::SeqCst), 6);
    assert!(gauge.max.load(Ordering::SeqCst) <= 2);
}

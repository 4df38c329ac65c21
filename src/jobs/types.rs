use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

use crate::jobs::error::JobError;
use crate::media::AudioFormat;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Transcribe,
    Synthesize,
}

impl Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "input")]
pub enum JobInput {
    RemoteAudio { url: String },
    Text { text: String, params: SynthesisParams },
}

/// Voice post-processing knobs. Numeric values outside the documented
/// ranges are clamped at admission, not rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisParams {
    pub lang: String,
    pub slow: bool,
    /// Playback rate, [0.5, 2.0].
    pub speed: f32,
    /// Pitch shift factor, [0.5, 1.5].
    pub pitch: f32,
    /// Gain, [0.1, 1.0].
    pub volume: f32,
    pub format: AudioFormat,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            slow: false,
            speed: 1.0,
            pitch: 1.0,
            volume: 1.0,
            format: AudioFormat::Mp3,
        }
    }
}

impl SynthesisParams {
    pub fn clamped(mut self) -> Self {
        self.speed = self.speed.clamp(0.5, 2.0);
        self.pitch = self.pitch.clamp(0.5, 1.5);
        self.volume = self.volume.clamp(0.1, 1.0);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: String,
    pub message: String,
}

impl From<&JobError> for JobFailure {
    fn from(e: &JobError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "result")]
pub enum JobResult {
    Transcript {
        text: String,
        audio_duration: f64,
        is_full: bool,
    },
    Audio {
        audio_url: String,
    },
    Error(JobFailure),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub input: JobInput,
    pub owner: String,
    pub callback: Option<String>,
    pub status: JobStatus,
    pub result: Option<JobResult>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set once webhook delivery has been resolved, None while pending
    /// or when no callback was supplied.
    pub webhook_delivered: Option<bool>,
}

impl Job {
    pub fn new(kind: JobKind, input: JobInput, owner: String, callback: Option<String>) -> Self {
        Self {
            id: format!("job-{}", Uuid::new_v4()),
            kind,
            input,
            owner,
            callback,
            status: JobStatus::Queued,
            result: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            webhook_delivered: None,
        }
    }
}

/// The caller-facing view returned by `/taskStatus` and embedded in
/// synchronous responses and webhook payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPayload {
    pub status: String,
    pub id: String,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_full: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl ResultPayload {
    pub fn from_job(job: &Job) -> Self {
        let mut payload = Self {
            status: match job.status {
                JobStatus::Failed => "error".to_string(),
                _ => "success".to_string(),
            },
            id: job.id.clone(),
            owner: job.owner.clone(),
            text: None,
            audio_duration: None,
            is_full: None,
            audio_url: None,
            error: None,
            error_kind: None,
            time_start: job.started_at,
            time_end: job.finished_at,
            webhook_url: job.callback.clone(),
        };
        match &job.result {
            Some(JobResult::Transcript { text, audio_duration, is_full }) => {
                payload.text = Some(text.clone());
                payload.audio_duration = Some(*audio_duration);
                payload.is_full = Some(*is_full);
            }
            Some(JobResult::Audio { audio_url }) => {
                payload.audio_url = Some(audio_url.clone());
            }
            Some(JobResult::Error(failure)) => {
                payload.error = Some(failure.message.clone());
                payload.error_kind = Some(failure.kind.clone());
            }
            None => {}
        }
        payload
    }
}

/// Pollable record view: job metadata plus the result payload when terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub owner: String,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_delivered: Option<bool>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            kind: job.kind,
            status: job.status,
            owner: job.owner.clone(),
            submitted_at: job.submitted_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            result: job.result.clone(),
            webhook_delivered: job.webhook_delivered,
        }
    }
}

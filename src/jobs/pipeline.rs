use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::engine::{Recognizer, Synthesizer, VoiceOptions};
use crate::jobs::error::JobError;
use crate::jobs::types::{Job, JobInput, JobResult, SynthesisParams};
use crate::media::{MediaAdapter, ScratchDir, ToolError};
use crate::Settings;

/// One pipeline serves both delivery modes; only what happens to the
/// returned result differs between sync and async submission.
#[derive(Clone)]
pub struct Pipeline {
    recognizer: Arc<dyn Recognizer>,
    synthesizer: Arc<dyn Synthesizer>,
    media: Arc<dyn MediaAdapter>,
    /// Retained synthesis outputs land here; the sweeper reclaims them.
    output_dir: PathBuf,
    settings: Arc<Settings>,
}

impl Pipeline {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        synthesizer: Arc<dyn Synthesizer>,
        media: Arc<dyn MediaAdapter>,
        output_dir: PathBuf,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            recognizer,
            synthesizer,
            media,
            output_dir,
            settings,
        }
    }

    /// Runs a job to a successful result or a classified error. Every
    /// intermediate artifact lives in a scratch dir deleted on all paths.
    pub async fn run(&self, job: &Job) -> Result<JobResult, JobError> {
        let deadline = Deadline::start(self.settings.deadline);
        match &job.input {
            JobInput::RemoteAudio { url } => self.transcribe(url, &deadline).await,
            JobInput::Text { text, params } => self.synthesize(&job.id, text, params, &deadline).await,
        }
    }

    async fn transcribe(&self, url: &str, deadline: &Deadline) -> Result<JobResult, JobError> {
        let scratch = ScratchDir::new().map_err(|e| JobError::Internal(e.to_string()))?;

        let raw = self
            .media
            .fetch(url, scratch.path(), deadline.remaining()?)
            .await
            .map_err(|e| match e {
                ToolError::Timeout => JobError::Timeout,
                e => JobError::Fetch(e.to_string()),
            })?;

        let normalized = self
            .media
            .normalize(&raw, deadline.remaining()?)
            .await
            .map_err(conversion)?;

        let audio_duration = self
            .media
            .probe_duration(&normalized)
            .await
            .map_err(|e| JobError::Conversion(e.to_string()))?;
        if audio_duration > self.settings.max_audio_secs {
            return Err(JobError::DurationExceeded {
                actual: audio_duration,
                limit: self.settings.max_audio_secs,
            });
        }

        let samples = self
            .media
            .load_samples(&normalized)
            .await
            .map_err(|e| JobError::Conversion(e.to_string()))?;

        let mut stream = self
            .recognizer
            .open_stream(None)
            .await
            .map_err(|e| JobError::Internal(e.to_string()))?;

        // cooperative deadline: checked at every chunk boundary, partial
        // recognition state is discarded on breach
        let mut parts = Vec::new();
        for chunk in samples.chunks(self.settings.chunk_samples) {
            deadline.check()?;
            if let Some(text) = stream
                .accept_chunk(chunk)
                .await
                .map_err(|e| JobError::Internal(e.to_string()))?
            {
                parts.push(text);
            }
        }

        deadline.check()?;
        let is_full = !parts.is_empty();
        if let Some(tail) = stream
            .finalize()
            .await
            .map_err(|e| JobError::Internal(e.to_string()))?
        {
            parts.push(tail);
        }

        // an empty transcript is a completed job, not a failure
        Ok(JobResult::Transcript {
            text: parts.join(" "),
            audio_duration,
            is_full,
        })
    }

    async fn synthesize(
        &self,
        job_id: &str,
        text: &str,
        params: &SynthesisParams,
        deadline: &Deadline,
    ) -> Result<JobResult, JobError> {
        let scratch = ScratchDir::new().map_err(|e| JobError::Internal(e.to_string()))?;
        let raw = scratch.file("synth.wav");

        let voice = VoiceOptions {
            lang: params.lang.clone(),
            slow: params.slow,
        };
        match tokio::time::timeout(
            deadline.remaining()?,
            self.synthesizer.synthesize(text, &voice, &raw),
        )
        .await
        {
            Err(_) => return Err(JobError::Timeout),
            Ok(Err(e)) => return Err(JobError::Conversion(e.to_string())),
            Ok(Ok(())) => {}
        }

        let filename = format!("{}.{}", job_id, params.format.extension());
        let output = self.output_dir.join(&filename);
        self.media
            .post_process(&raw, params, &output, deadline.remaining()?)
            .await
            .map_err(conversion)?;

        info!("Synthesized output retained at {:?}", output);
        Ok(JobResult::Audio {
            audio_url: format!("/audio/{}", filename),
        })
    }
}

fn conversion(e: ToolError) -> JobError {
    match e {
        ToolError::Timeout => JobError::Timeout,
        e => JobError::Conversion(e.to_string()),
    }
}

/// Per-job wall-clock budget. Subprocess invocations get the remaining
/// slice; the recognition loop checks between chunks.
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn check(&self) -> Result<(), JobError> {
        if self.started.elapsed() >= self.limit {
            Err(JobError::Timeout)
        } else {
            Ok(())
        }
    }

    pub fn remaining(&self) -> Result<Duration, JobError> {
        self.limit
            .checked_sub(self.started.elapsed())
            .filter(|d| !d.is_zero())
            .ok_or(JobError::Timeout)
    }
}

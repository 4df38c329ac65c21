use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::jobs::error::JobError;
use crate::jobs::store::JobStore;
use crate::jobs::types::{Job, JobInput, JobKind};

/// Admission control: field validation, then a concurrency ceiling over
/// Queued + Processing. Rejection never creates a record and never blocks.
pub struct AdmissionGate {
    store: Arc<JobStore>,
    queue: mpsc::Sender<String>,
    max_active: usize,
}

impl AdmissionGate {
    pub fn new(store: Arc<JobStore>, queue: mpsc::Sender<String>, max_active: usize) -> Self {
        Self {
            store,
            queue,
            max_active,
        }
    }

    /// Asynchronous admission: record as Queued and enqueue for a worker.
    pub async fn submit_queued(
        &self,
        input: JobInput,
        owner: String,
        callback: Option<String>,
    ) -> Result<Job, JobError> {
        let job = self.admit(input, owner, callback).await?;

        if let Err(e) = self.queue.try_send(job.id.clone()) {
            // ceiling check and queue capacity line up, so this only fires
            // on a race; roll the record back and report overload
            warn!("Queue refused job {}: {}", job.id, e);
            self.store.remove_queued(&job.id).await;
            return Err(JobError::Overload);
        }

        info!("Admitted job {} ({})", job.id, job.kind);
        Ok(job)
    }

    /// Synchronous admission: record only, the caller runs the pipeline
    /// itself and owns the job until terminal.
    pub async fn submit_inline(&self, input: JobInput, owner: String) -> Result<Job, JobError> {
        let job = self.admit(input, owner, None).await?;
        info!("Admitted inline job {} ({})", job.id, job.kind);
        Ok(job)
    }

    async fn admit(
        &self,
        input: JobInput,
        owner: String,
        callback: Option<String>,
    ) -> Result<Job, JobError> {
        let input = validate(input, &owner, callback.as_deref())?;

        let kind = match &input {
            JobInput::RemoteAudio { .. } => JobKind::Transcribe,
            JobInput::Text { .. } => JobKind::Synthesize,
        };
        let job = Job::new(kind, input, owner, callback);
        // ceiling check and record creation happen atomically in the store,
        // so racing submissions cannot both slip under the ceiling
        if !self.store.try_insert(job.clone(), self.max_active).await {
            return Err(JobError::Overload);
        }
        Ok(job)
    }
}

// Caller errors are caught here, before any record exists.
fn validate(input: JobInput, owner: &str, callback: Option<&str>) -> Result<JobInput, JobError> {
    if owner.trim().is_empty() {
        return Err(JobError::Validation("missing owner".to_string()));
    }
    if let Some(url) = callback {
        if !is_http_url(url) {
            return Err(JobError::Validation("webhook_url must be an http(s) URL".to_string()));
        }
    }
    match input {
        JobInput::RemoteAudio { url } => {
            if url.trim().is_empty() {
                return Err(JobError::Validation("missing audio_url".to_string()));
            }
            if !is_http_url(&url) {
                return Err(JobError::Validation("audio_url must be an http(s) URL".to_string()));
            }
            Ok(JobInput::RemoteAudio { url })
        }
        JobInput::Text { text, params } => {
            if text.trim().is_empty() {
                return Err(JobError::Validation("missing text".to_string()));
            }
            if params.lang.trim().is_empty() {
                return Err(JobError::Validation("missing lang".to_string()));
            }
            Ok(JobInput::Text {
                text,
                params: params.clamped(),
            })
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::jobs::types::{Job, JobResult, JobStatus, JobView};

/// In-memory job table. One writer per job is guaranteed by the worker
/// ownership rule; polling readers share the lock. Terminal records are
/// evicted oldest-first once `max_records` is reached, live records never
/// are.
pub struct JobStore {
    inner: RwLock<Inner>,
    max_records: usize,
}

struct Inner {
    jobs: HashMap<String, Job>,
    // Queued + Processing
    active: usize,
}

#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
pub struct StoreStats {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobStore {
    pub fn new(max_records: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                jobs: HashMap::new(),
                active: 0,
            }),
            max_records,
        }
    }

    /// Ceiling check and record creation under one lock acquisition, so
    /// concurrent admissions can never push Queued + Processing past
    /// `max_active`. Returns false without touching the table when the
    /// ceiling is reached.
    pub async fn try_insert(&self, job: Job, max_active: usize) -> bool {
        let mut inner = self.inner.write().await;
        if inner.active >= max_active {
            return false;
        }
        if inner.jobs.len() >= self.max_records {
            evict_oldest_terminal(&mut inner.jobs);
        }
        inner.active += 1;
        debug!("Recorded job {} ({})", job.id, job.kind);
        inner.jobs.insert(job.id.clone(), job);
        true
    }

    /// Undoes an admission that could not be enqueued. Only valid while the
    /// job is still Queued.
    pub async fn remove_queued(&self, id: &str) {
        let mut inner = self.inner.write().await;
        let queued = inner
            .jobs
            .get(id)
            .map_or(false, |j| j.status == JobStatus::Queued);
        if queued {
            inner.jobs.remove(id);
            inner.active -= 1;
        }
    }

    pub async fn get(&self, id: &str) -> Option<JobView> {
        self.inner.read().await.jobs.get(id).map(JobView::from)
    }

    pub async fn active_count(&self) -> usize {
        self.inner.read().await.active
    }

    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        let mut stats = StoreStats::default();
        for job in inner.jobs.values() {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Queued -> Processing. Returns the job for the owning worker, or None
    /// when the record has vanished or already moved on.
    pub async fn mark_processing(&self, id: &str) -> Option<Job> {
        let mut inner = self.inner.write().await;
        let job = inner.jobs.get_mut(id)?;
        if job.status != JobStatus::Queued {
            warn!("Job {} is {} at dequeue, skipping", id, job.status);
            return None;
        }
        job.status = JobStatus::Processing;
        job.started_at = Some(chrono::Utc::now());
        Some(job.clone())
    }

    /// Writes the terminal state. The result is write-once: a second finish
    /// on the same job is ignored.
    pub async fn finish(&self, id: &str, result: JobResult) {
        let mut inner = self.inner.write().await;
        let Some(job) = inner.jobs.get_mut(id) else {
            warn!("Finish for unknown job {}", id);
            return;
        };
        if job.status.is_terminal() {
            warn!("Job {} already terminal, ignoring second result", id);
            return;
        }
        job.status = match result {
            JobResult::Error(_) => JobStatus::Failed,
            _ => JobStatus::Completed,
        };
        job.result = Some(result);
        job.finished_at = Some(chrono::Utc::now());
        inner.active -= 1;
    }

    pub async fn set_webhook_delivered(&self, id: &str, delivered: bool) {
        let mut inner = self.inner.write().await;
        if let Some(job) = inner.jobs.get_mut(id) {
            job.webhook_delivered = Some(delivered);
        }
    }

    /// Snapshot of the full record, used by workers to build payloads.
    pub async fn snapshot(&self, id: &str) -> Option<Job> {
        self.inner.read().await.jobs.get(id).cloned()
    }
}

fn evict_oldest_terminal(jobs: &mut HashMap<String, Job>) {
    let oldest = jobs
        .values()
        .filter(|j| j.status.is_terminal())
        .min_by_key(|j| j.finished_at)
        .map(|j| j.id.clone());
    if let Some(id) = oldest {
        debug!("Evicting terminal job {} to cap store size", id);
        jobs.remove(&id);
    }
}

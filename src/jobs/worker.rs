use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::jobs::pipeline::Pipeline;
use crate::jobs::store::JobStore;
use crate::jobs::types::{Job, JobFailure, JobResult};
use crate::jobs::webhook::WebhookDispatcher;

/// Runs one job to its terminal state: pipeline, record, then webhook.
/// Nothing that happens in here ever escapes to the submitter.
pub struct JobRunner {
    store: Arc<JobStore>,
    pipeline: Pipeline,
    webhook: WebhookDispatcher,
}

impl JobRunner {
    pub fn new(store: Arc<JobStore>, pipeline: Pipeline, webhook: WebhookDispatcher) -> Self {
        Self {
            store,
            pipeline,
            webhook,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Queued path: a worker dequeued this id and now owns the job.
    pub async fn execute(&self, id: &str) {
        let Some(job) = self.store.mark_processing(id).await else {
            return;
        };
        info!("Processing job {} ({})", job.id, job.kind);
        self.run_to_terminal(job).await;
    }

    /// Synchronous path: the submitting handler owns the job and blocks
    /// until the terminal record is available.
    pub async fn execute_inline(&self, job: Job) -> Job {
        let id = job.id.clone();
        if let Some(owned) = self.store.mark_processing(&id).await {
            self.run_to_terminal(owned).await;
        }
        self.store.snapshot(&id).await.unwrap_or(job)
    }

    async fn run_to_terminal(&self, job: Job) {
        let pipeline = self.pipeline.clone();
        let owned = job.clone();
        // spawned so a panicking pipeline surfaces as a JoinError instead
        // of taking the worker down; scratch dirs unwind-clean regardless
        let outcome = tokio::spawn(async move { pipeline.run(&owned).await }).await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Job {} failed: {}", job.id, e);
                JobResult::Error(JobFailure::from(&e))
            }
            Err(join_err) => {
                error!("Job {} aborted: {}", job.id, join_err);
                JobResult::Error(JobFailure {
                    kind: "internal_error".to_string(),
                    message: join_err.to_string(),
                })
            }
        };

        self.store.finish(&job.id, result).await;

        if let Some(url) = &job.callback {
            if let Some(snapshot) = self.store.snapshot(&job.id).await {
                let delivered = self.webhook.deliver(url, &snapshot).await;
                self.store.set_webhook_delivered(&job.id, delivered).await;
            }
        }
    }
}

/// Fixed pool of long-lived executors over one shared FIFO queue.
pub struct WorkerPool {
    runner: Arc<JobRunner>,
    receiver: Arc<Mutex<mpsc::Receiver<String>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(runner: Arc<JobRunner>, receiver: mpsc::Receiver<String>) -> Self {
        Self {
            runner,
            receiver: Arc::new(Mutex::new(receiver)),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub async fn spawn_workers(&self, count: usize) {
        let mut workers = self.workers.lock().await;
        for n in 0..count {
            let runner = self.runner.clone();
            let receiver = self.receiver.clone();
            workers.push(tokio::spawn(async move {
                info!("Worker {} started", n);
                loop {
                    let next = receiver.lock().await.recv().await;
                    match next {
                        Some(id) => runner.execute(&id).await,
                        None => break,
                    }
                }
                info!("Worker {} stopped", n);
            }));
        }
    }

    /// Blocks until the queue closes and every worker drains.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut workers = self.workers.lock().await;
        for worker in workers.drain(..) {
            worker.await?;
        }
        Ok(())
    }
}

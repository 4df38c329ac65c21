use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::jobs::types::{Job, ResultPayload};

/// Outbound result push. Bounded retries with exponential backoff; a job
/// whose webhook never lands is still Completed/Failed in the store, the
/// delivery outcome is just recorded alongside it.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    attempts: u32,
}

impl WebhookDispatcher {
    pub fn new(timeout: Duration, attempts: u32) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, attempts })
    }

    /// Returns whether any attempt succeeded. Never propagates errors to
    /// the worker that owns the job.
    pub async fn deliver(&self, url: &str, job: &Job) -> bool {
        let payload = ResultPayload::from_job(job);
        let mut delay = Duration::from_secs(1);

        for attempt in 1..=self.attempts.max(1) {
            match self.client.post(url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("Delivered webhook for job {} to {}", job.id, url);
                    return true;
                }
                Ok(resp) => {
                    warn!(
                        "Webhook for job {} got {} from {} (attempt {}/{})",
                        job.id,
                        resp.status(),
                        url,
                        attempt,
                        self.attempts
                    );
                }
                Err(e) => {
                    warn!(
                        "Webhook for job {} to {} failed (attempt {}/{}): {}",
                        job.id, url, attempt, self.attempts, e
                    );
                }
            }
            if attempt < self.attempts {
                sleep(delay).await;
                delay *= 2;
            }
        }

        error!("Giving up on webhook for job {} after {} attempts", job.id, self.attempts);
        false
    }
}

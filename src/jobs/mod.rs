pub mod error;
pub mod gate;
pub mod pipeline;
pub mod store;
pub mod sweeper;
pub mod types;
pub mod webhook;
pub mod worker;

#[cfg(test)]
pub(crate) mod tests;

pub use error::JobError;
pub use gate::AdmissionGate;
pub use pipeline::Pipeline;
pub use store::JobStore;
pub use sweeper::RetentionSweeper;
pub use types::{Job, JobInput, JobKind, JobResult, JobStatus, JobView, ResultPayload, SynthesisParams};
pub use webhook::WebhookDispatcher;
pub use worker::{JobRunner, WorkerPool};

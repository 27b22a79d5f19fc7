//! Reporting sinks the engine publishes to.
//!
//! All calls are fire-and-forget from the engine's side: implementations deal
//! with their own transport failures.

mod memory;
mod tracing_reporter;

use std::path::PathBuf;

use async_trait::async_trait;

pub use memory::{MemoryLogSink, MemoryReporter, ReportEvent};
pub use tracing_reporter::TracingReporter;

use crate::{
    log::LogChunk,
    status::{Status, StepOutcome, Verdict},
};

/// Receives step, job and artifact reports.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Report a step status change. `outcome` is set once the step is finished.
    async fn push_status(&self, step_id: &str, status: Status, outcome: Option<StepOutcome>);

    /// Report a finished step together with its captured output.
    async fn push_output(&self, step_id: &str, status: Status, outcome: StepOutcome, output: &[u8]);

    /// Report a job status change. `verdict` is set once the job is finished.
    async fn push_job_status(&self, status: Status, verdict: Option<Verdict>);

    async fn push_artifacts(&self, paths: &[PathBuf]);
}

/// Receives build log output.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn push_chunk(&self, source: &str, chunk: &LogChunk);
}

use std::path::PathBuf;

use async_trait::async_trait;

use super::Reporter;
use crate::status::{Status, StepOutcome, Verdict};

/// Reporter that turns every report into a structured `tracing` event.
#[derive(Debug, Default, Clone)]
pub struct TracingReporter;

#[async_trait]
impl Reporter for TracingReporter {
    async fn push_status(&self, step_id: &str, status: Status, outcome: Option<StepOutcome>) {
        match outcome {
            Some(outcome) if !outcome.is_success() => tracing::warn!(
                step_id,
                status = status.as_ref(),
                outcome = outcome.as_ref(),
                exit_code = outcome.exit_code(),
                "Step status"
            ),
            Some(outcome) => tracing::info!(
                step_id,
                status = status.as_ref(),
                outcome = outcome.as_ref(),
                exit_code = outcome.exit_code(),
                "Step status"
            ),
            None => tracing::info!(step_id, status = status.as_ref(), "Step status"),
        }
    }

    async fn push_output(&self, step_id: &str, status: Status, outcome: StepOutcome, output: &[u8]) {
        tracing::info!(
            step_id,
            status = status.as_ref(),
            outcome = outcome.as_ref(),
            exit_code = outcome.exit_code(),
            bytes = output.len(),
            "Step output captured"
        );
    }

    async fn push_job_status(&self, status: Status, verdict: Option<Verdict>) {
        match verdict {
            Some(verdict) => tracing::info!(
                status = status.as_ref(),
                verdict = verdict.as_ref(),
                "Job status"
            ),
            None => tracing::info!(status = status.as_ref(), "Job status"),
        }
    }

    async fn push_artifacts(&self, paths: &[PathBuf]) {
        tracing::info!(count = paths.len(), "Artifacts published");
        for path in paths {
            tracing::debug!("Artifact: {}", path.display());
        }
    }
}

use thiserror::Error;
use tokio::task::JoinError;
use utils::GlobTreeError;

/// Conditions that abort a run instead of just failing it.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("step `{step_id}` declares an invalid artifact pattern: {source}")]
    InvalidArtifactPattern {
        step_id: String,
        #[source]
        source: GlobTreeError,
    },
    #[error("background task failed: {0}")]
    BackgroundTask(#[from] JoinError),
}

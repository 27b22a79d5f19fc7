//! Artifact collection for finished steps.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use utils::GlobTreeError;

use crate::{error::EngineError, reporter::Reporter};

/// Resolves artifact patterns to files under a workspace.
pub trait ArtifactMatcher: Send + Sync {
    fn matches(&self, root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, GlobTreeError>;

    /// Reject malformed patterns before any step after this one runs.
    fn validate(&self, patterns: &[String]) -> Result<(), GlobTreeError> {
        utils::validate_patterns(patterns)
    }
}

/// Default matcher: recursive glob over the workspace tree.
#[derive(Debug, Default, Clone)]
pub struct GlobTreeMatcher;

impl ArtifactMatcher for GlobTreeMatcher {
    fn matches(&self, root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, GlobTreeError> {
        utils::glob_tree(root, patterns)
    }
}

/// Collect the files a step declared and publish them in one batch.
///
/// Nothing is matched or reported when `patterns` is empty. An invalid
/// pattern is a defect in the plan and comes back as
/// [`EngineError::InvalidArtifactPattern`].
pub async fn publish_artifacts(
    reporter: Arc<dyn Reporter>,
    matcher: Arc<dyn ArtifactMatcher>,
    step_id: String,
    workspace: PathBuf,
    patterns: Vec<String>,
) -> Result<usize, EngineError> {
    if patterns.is_empty() {
        tracing::debug!("[{}] Skipping artifact collection", step_id);
        return Ok(0);
    }

    tracing::info!(
        "[{}] Collecting artifacts in {} matching {:?}",
        step_id,
        workspace.display(),
        patterns
    );

    let matches = tokio::task::spawn_blocking(move || matcher.matches(&workspace, &patterns))
        .await?
        .map_err(|source| EngineError::InvalidArtifactPattern {
            step_id: step_id.clone(),
            source,
        })?;

    tracing::info!("[{}] Found {} matching artifacts", step_id, matches.len());
    reporter.push_artifacts(&matches).await;
    Ok(matches.len())
}

//! Build plan loading.
//!
//! A plan is read from JSON or TOML, picked by file extension:
//!
//! ```toml
//! workspace = "."
//!
//! [[steps]]
//! id = "test"
//! script = "cargo test"
//! artifacts = ["*.xml"]
//! ```

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::step::StepSpec;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON plan: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML plan: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported plan format for {} (expected .json or .toml)", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("duplicate step id `{0}`")]
    DuplicateStepId(String),
}

/// Ordered list of steps plus the workspace they run in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub workspace: PathBuf,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

impl BuildPlan {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, spec: StepSpec) -> Self {
        self.steps.push(spec);
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, PlanError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, PlanError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and validate a plan file. A relative workspace is taken from the
    /// directory holding the file.
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let content = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut plan = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            Some("toml") => Self::from_toml_str(&content)?,
            _ => return Err(PlanError::UnsupportedFormat(path.to_path_buf())),
        };

        if plan.workspace.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            plan.workspace = base.join(&plan.workspace);
        }

        plan.validate()?;
        tracing::debug!(
            "Loaded plan {} with {} steps",
            path.display(),
            plan.steps.len()
        );
        Ok(plan)
    }

    /// Step ids must be unique within a plan.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(PlanError::DuplicateStepId(step.id.clone()));
            }
        }
        Ok(())
    }
}

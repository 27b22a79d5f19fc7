use std::{
    collections::BTreeMap,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("step id must not be empty")]
    EmptyId,
    #[error("step `{0}` has an empty script")]
    EmptyScript(String),
    #[error("step `{0}` script contains a NUL byte")]
    NulInScript(String),
    #[error("step `{id}` has an invalid environment variable name `{key}`")]
    InvalidEnvKey { id: String, key: String },
    #[error("step `{id}` environment variable `{key}` contains a NUL byte")]
    NulInEnvValue { id: String, key: String },
}

/// A step as declared in a build plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub id: String,
    pub script: String,
    /// Extra environment variables, layered over the agent's own environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory override. Relative paths are taken from the workspace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub capture_output: bool,
    /// Glob patterns of files to publish once the step has run.
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl StepSpec {
    pub fn new(id: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            script: script.into(),
            env: BTreeMap::new(),
            cwd: None,
            capture_output: false,
            artifacts: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn with_artifacts<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifacts = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// Runtime instance of a [`StepSpec`], ready to hand to an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    id: String,
    script: String,
    env: BTreeMap<OsString, OsString>,
    cwd: PathBuf,
    capture_output: bool,
}

impl Step {
    /// Build a step on top of the current process environment. Variables
    /// are passed through as raw OS strings, UTF-8 or not.
    pub fn new(spec: &StepSpec, workspace: &Path) -> Result<Self, StepError> {
        Self::with_base_env(spec, workspace, std::env::vars_os())
    }

    /// Build a step on top of an explicit base environment. Variables from the
    /// spec win over base variables with the same name.
    pub fn with_base_env<I, K, V>(
        spec: &StepSpec,
        workspace: &Path,
        base: I,
    ) -> Result<Self, StepError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        validate(spec)?;

        let mut env: BTreeMap<OsString, OsString> = base
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        env.extend(
            spec.env
                .iter()
                .map(|(k, v)| (OsString::from(k), OsString::from(v))),
        );

        let cwd = match &spec.cwd {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => workspace.join(dir),
            None => workspace.to_path_buf(),
        };

        Ok(Self {
            id: spec.id.clone(),
            script: spec.script.clone(),
            env,
            cwd,
            capture_output: spec.capture_output,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn env(&self) -> &BTreeMap<OsString, OsString> {
        &self.env
    }

    pub fn env_var(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.env.get(key.as_ref()).map(OsString::as_os_str)
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn capture_output(&self) -> bool {
        self.capture_output
    }
}

fn validate(spec: &StepSpec) -> Result<(), StepError> {
    if spec.id.trim().is_empty() {
        return Err(StepError::EmptyId);
    }
    if spec.script.trim().is_empty() {
        return Err(StepError::EmptyScript(spec.id.clone()));
    }
    if spec.script.contains('\0') {
        return Err(StepError::NulInScript(spec.id.clone()));
    }
    for (key, value) in &spec.env {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(StepError::InvalidEnvKey {
                id: spec.id.clone(),
                key: key.clone(),
            });
        }
        if value.contains('\0') {
            return Err(StepError::NulInEnvValue {
                id: spec.id.clone(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}

/// What an adapter reports after running a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Captured stdout, only present when the step asked for it.
    pub output: Option<Bytes>,
}

impl StepResult {
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            output: None,
        }
    }

    pub fn failure(exit_code: Option<i32>) -> Self {
        Self {
            success: false,
            exit_code,
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<Bytes>) -> Self {
        self.output = Some(output.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Vec<(String, String)> {
        vec![
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("CI".to_string(), "false".to_string()),
        ]
    }

    #[test]
    fn spec_env_overrides_base_env() {
        let spec = StepSpec::new("test", "make test")
            .with_env("CI", "true")
            .with_env("RUST_LOG", "debug");

        let step = Step::with_base_env(&spec, Path::new("/ws"), base()).unwrap();

        assert_eq!(step.env_var("CI"), Some(OsStr::new("true")));
        assert_eq!(step.env_var("PATH"), Some(OsStr::new("/usr/bin")));
        assert_eq!(step.env_var("RUST_LOG"), Some(OsStr::new("debug")));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_base_env_is_inherited() {
        use std::os::unix::ffi::OsStrExt;

        let latin1 = OsStr::from_bytes(b"caf\xe9").to_os_string();
        let base = vec![
            (OsString::from("GREETING"), latin1.clone()),
            (OsStr::from_bytes(b"K\xff").to_os_string(), OsString::from("v")),
        ];

        let step = Step::with_base_env(&StepSpec::new("a", "true"), Path::new("/ws"), base).unwrap();

        assert_eq!(step.env_var("GREETING"), Some(latin1.as_os_str()));
        assert_eq!(step.env_var(OsStr::from_bytes(b"K\xff")), Some(OsStr::new("v")));
    }

    #[test]
    fn process_env_is_inherited() {
        let step = Step::new(&StepSpec::new("a", "true"), Path::new("/ws")).unwrap();
        for (key, value) in std::env::vars_os() {
            assert_eq!(step.env_var(&key), Some(value.as_os_str()));
        }
    }

    #[test]
    fn cwd_resolution() {
        let ws = Path::new("/ws");
        let default = Step::with_base_env(&StepSpec::new("a", "true"), ws, base()).unwrap();
        assert_eq!(default.cwd(), Path::new("/ws"));

        let relative =
            Step::with_base_env(&StepSpec::new("b", "true").with_cwd("sub/dir"), ws, base())
                .unwrap();
        assert_eq!(relative.cwd(), Path::new("/ws/sub/dir"));

        let absolute =
            Step::with_base_env(&StepSpec::new("c", "true").with_cwd("/tmp"), ws, base()).unwrap();
        assert_eq!(absolute.cwd(), Path::new("/tmp"));
    }

    #[test]
    fn rejects_unrunnable_specs() {
        let ws = Path::new("/ws");
        assert_eq!(
            Step::with_base_env(&StepSpec::new(" ", "true"), ws, base()),
            Err(StepError::EmptyId)
        );
        assert_eq!(
            Step::with_base_env(&StepSpec::new("a", "  \n"), ws, base()),
            Err(StepError::EmptyScript("a".into()))
        );
        assert!(matches!(
            Step::with_base_env(&StepSpec::new("a", "true").with_env("A=B", "x"), ws, base()),
            Err(StepError::InvalidEnvKey { .. })
        ));
        assert!(matches!(
            Step::with_base_env(&StepSpec::new("a", "true").with_env("A", "x\0"), ws, base()),
            Err(StepError::NulInEnvValue { .. })
        ));
    }

    #[test]
    fn spec_deserializes_with_defaults() {
        let spec: StepSpec =
            serde_json::from_str(r#"{"id": "lint", "script": "cargo clippy"}"#).unwrap();
        assert_eq!(spec, StepSpec::new("lint", "cargo clippy"));
    }
}

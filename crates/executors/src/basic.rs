//! Adapter that runs each step as a local shell process.

use std::{io, path::PathBuf, process::Stdio};

use async_trait::async_trait;
use bytes::Bytes;
use engine::{Adapter, AdapterError, Log, Step, StepResult};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
};

use crate::shell::{default_shell, script_flag};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAdapterConfig {
    /// Directory steps run in unless they override it.
    pub workspace: PathBuf,
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Maximum size of a single log chunk read from a step's output.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    4096
}

impl BasicAdapterConfig {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            shell: default_shell(),
            chunk_size: default_chunk_size(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

/// Runs step scripts with `<shell> -c <script>` directly on the host.
#[derive(Debug, Clone)]
pub struct BasicAdapter {
    config: BasicAdapterConfig,
}

impl BasicAdapter {
    pub fn new(config: BasicAdapterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BasicAdapterConfig {
        &self.config
    }
}

#[async_trait]
impl Adapter for BasicAdapter {
    async fn prepare(&mut self, log: &Log) -> Result<(), AdapterError> {
        tokio::fs::create_dir_all(&self.config.workspace).await?;
        log.line(format!(
            "Running steps in {} with {}",
            self.config.workspace.display(),
            self.config.shell
        ));
        Ok(())
    }

    async fn run(&mut self, step: &Step, log: &Log) -> Result<StepResult, AdapterError> {
        let shell = self.config.shell.as_str();
        tracing::debug!("[{}] Spawning {} {}", step.id(), shell, script_flag(shell));

        let mut child = Command::new(shell)
            .arg(script_flag(shell))
            .arg(step.script())
            .env_clear()
            .envs(step.env())
            .current_dir(step.cwd())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AdapterError::Spawn {
                command: format!("{} {}", shell, script_flag(shell)),
                source,
            })?;

        let chunk_size = self.config.chunk_size.max(1);
        let (stdout, stderr) = tokio::join!(
            pump(child.stdout.take(), log, chunk_size, step.capture_output()),
            pump(child.stderr.take(), log, chunk_size, false),
        );
        let captured = stdout?;
        stderr?;

        let status = child.wait().await?;
        tracing::debug!("[{}] Exited with {}", step.id(), status);

        let result = if status.success() {
            StepResult::success()
        } else {
            StepResult::failure(status.code())
        };
        Ok(if step.capture_output() {
            result.with_output(captured)
        } else {
            result
        })
    }

    async fn shutdown(&mut self, log: &Log) -> Result<(), AdapterError> {
        log.line("Finished running steps");
        Ok(())
    }
}

/// Copy a pipe into the build log chunk by chunk, optionally keeping a copy.
async fn pump<R>(reader: Option<R>, log: &Log, chunk_size: usize, capture: bool) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(Vec::new());
    };

    let mut buf = vec![0u8; chunk_size];
    let mut captured = Vec::new();
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        log.write(Bytes::copy_from_slice(&buf[..n]));
        if capture {
            captured.extend_from_slice(&buf[..n]);
        }
    }
    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{LogStream, StepSpec};

    async fn collect(mut stream: LogStream) -> String {
        let mut out = Vec::new();
        while let Some(chunk) = stream.recv().await {
            out.extend_from_slice(chunk.bytes());
        }
        String::from_utf8(out).unwrap()
    }

    fn step(spec: StepSpec, workspace: &std::path::Path) -> Step {
        Step::new(&spec, workspace).unwrap()
    }

    #[tokio::test]
    async fn test_simple_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = BasicAdapter::new(BasicAdapterConfig::new(dir.path()));
        let (log, stream) = Log::channel();

        let result = adapter
            .run(&step(StepSpec::new("hello", "echo hello"), dir.path()), &log)
            .await
            .unwrap();
        drop(log);

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.output, None);
        assert_eq!(collect(stream).await, "hello\n");
    }

    #[tokio::test]
    async fn test_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = BasicAdapter::new(BasicAdapterConfig::new(dir.path()));
        let (log, _stream) = Log::channel();

        let result = adapter
            .run(&step(StepSpec::new("fail", "exit 3"), dir.path()), &log)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_captures_stdout_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = BasicAdapter::new(BasicAdapterConfig::new(dir.path()));
        let (log, stream) = Log::channel();
        let spec = StepSpec::new("capture", "echo out; echo err >&2").with_capture_output(true);

        let result = adapter.run(&step(spec, dir.path()), &log).await.unwrap();
        drop(log);

        assert_eq!(result.output, Some(Bytes::from_static(b"out\n")));
        let logged = collect(stream).await;
        assert!(logged.contains("out\n"));
        assert!(logged.contains("err\n"));
    }

    #[tokio::test]
    async fn test_env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut adapter = BasicAdapter::new(BasicAdapterConfig::new(dir.path()));
        let (log, _stream) = Log::channel();
        let spec = StepSpec::new("env", "echo \"$GREETING\" > greeting.txt")
            .with_env("GREETING", "hi there")
            .with_cwd("sub");

        let result = adapter.run(&step(spec, dir.path()), &log).await.unwrap();

        assert!(result.success);
        let written = std::fs::read_to_string(dir.path().join("sub/greeting.txt")).unwrap();
        assert_eq!(written, "hi there\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_env_reaches_the_process() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let dir = tempfile::tempdir().unwrap();
        let mut adapter = BasicAdapter::new(BasicAdapterConfig::new(dir.path()));
        let (log, _stream) = Log::channel();
        let spec = StepSpec::new("latin1", "printf %s \"$GREETING\" > greeting.bin");
        let mut base: Vec<_> = std::env::vars_os().collect();
        base.push(("GREETING".into(), OsStr::from_bytes(b"caf\xe9").to_os_string()));
        let step = Step::with_base_env(&spec, dir.path(), base).unwrap();

        let result = adapter.run(&step, &log).await.unwrap();

        assert!(result.success);
        assert_eq!(
            std::fs::read(dir.path().join("greeting.bin")).unwrap(),
            b"caf\xe9"
        );
    }

    #[tokio::test]
    async fn test_missing_cwd_is_an_adapter_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = BasicAdapter::new(BasicAdapterConfig::new(dir.path()));
        let (log, _stream) = Log::channel();
        let spec = StepSpec::new("nowhere", "true").with_cwd("does/not/exist");

        let err = adapter.run(&step(spec, dir.path()), &log).await.unwrap_err();

        assert!(matches!(err, AdapterError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_prepare_creates_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("checkout");
        let mut adapter = BasicAdapter::new(BasicAdapterConfig::new(&workspace));
        let (log, _stream) = Log::channel();

        adapter.prepare(&log).await.unwrap();
        adapter.shutdown(&log).await.unwrap();

        assert!(workspace.is_dir());
    }

    #[test]
    fn test_config_defaults() {
        let config: BasicAdapterConfig =
            serde_json::from_str(r#"{"workspace": "/src"}"#).unwrap();
        assert_eq!(config.shell, default_shell());
        assert_eq!(config.chunk_size, 4096);
    }
}

//! Terminal output: the build log on stdout, plan banners on stderr.

use async_trait::async_trait;
use colored::Colorize;
use engine::{BuildPlan, LogChunk, LogSink, Verdict};
use tokio::{
    io::{AsyncWriteExt, Stdout},
    sync::Mutex,
};

/// Writes build log chunks to stdout as they arrive.
pub struct StdoutLogSink {
    stdout: Mutex<Stdout>,
}

impl StdoutLogSink {
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutLogSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogSink for StdoutLogSink {
    async fn push_chunk(&self, source: &str, chunk: &LogChunk) {
        let mut stdout = self.stdout.lock().await;
        if let Err(e) = stdout.write_all(chunk.bytes()).await {
            tracing::warn!("Failed to write {} log chunk: {}", source, e);
            return;
        }
        if let Err(e) = stdout.flush().await {
            tracing::warn!("Failed to flush {} log: {}", source, e);
        }
    }
}

/// Plan and verdict banners.
#[derive(Debug, Default)]
pub struct OutputHandler;

impl OutputHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn print_plan(&self, plan: &BuildPlan) {
        eprintln!(
            "{} {} step(s) in {}",
            "==>".bright_cyan(),
            plan.steps.len(),
            plan.workspace.display().to_string().bright_white()
        );
        for (i, step) in plan.steps.iter().enumerate() {
            eprintln!("    {}. {}", i + 1, step.id);
        }
    }

    pub fn print_verdict(&self, verdict: Verdict) {
        let label = match verdict {
            Verdict::Passed => "PASSED".bright_green().bold(),
            Verdict::Failed => "FAILED".bright_red().bold(),
        };
        eprintln!("{} Build {}", "==>".bright_cyan(), label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::StepSpec;

    #[tokio::test]
    async fn default_sink_writes_chunks() {
        let sink = StdoutLogSink::default();
        sink.push_chunk("console", &LogChunk::new("hello\n")).await;
        sink.push_chunk("console", &LogChunk::new("")).await;
    }

    #[test]
    fn default_handler_prints_banners() {
        let output = OutputHandler::default();
        let plan = BuildPlan::new("/ws").step(StepSpec::new("build", "make"));
        output.print_plan(&plan);
        output.print_verdict(Verdict::Passed);
        output.print_verdict(Verdict::Failed);
    }
}

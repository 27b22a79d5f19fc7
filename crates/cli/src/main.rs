//! ci-runner - run a build plan on this machine
//!
//! Executes every step of a plan file with the local shell, streams the build
//! log to stdout and exits with the plan's verdict.

mod output;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use engine::{BuildPlan, Engine, TracingReporter, Verdict, run_build_plan};
use executors::{BasicAdapter, BasicAdapterConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::output::{OutputHandler, StdoutLogSink};

/// ci-runner - run a build plan and report its verdict
#[derive(Parser)]
#[command(name = "ci-runner")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a build plan and report its verdict")]
#[command(long_about = r#"
Runs the steps of a build plan in order with the local shell. The first
failing step stops the plan; declared artifacts are collected for every step
that ran.

Exit status: 0 when the plan passed, 1 when it failed, 2 when it could not be
run at all (unreadable plan, invalid artifact pattern).

Examples:
  ci-runner plan.toml                       # Run in the plan's workspace
  ci-runner plan.json -w /tmp/checkout      # Override the workspace
  CI_RUNNER_SHELL=bash ci-runner plan.toml  # Use bash for step scripts
"#)]
struct Cli {
    /// Build plan file (.json or .toml)
    plan: PathBuf,

    /// Workspace directory, overriding the one declared in the plan
    #[arg(short, long, env = "CI_RUNNER_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Shell used to run step scripts
    #[arg(long, env = "CI_RUNNER_SHELL")]
    shell: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the build log, diagnostics go to stderr
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ci_runner={0},engine={0},executors={0},warn", log_level).into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli).await {
        Ok(Verdict::Passed) => ExitCode::SUCCESS,
        Ok(Verdict::Failed) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<Verdict> {
    let mut plan = BuildPlan::load(&cli.plan)
        .with_context(|| format!("Failed to load plan {}", cli.plan.display()))?;
    if let Some(workspace) = cli.workspace {
        plan = plan.with_workspace(workspace);
    }

    let mut config = BasicAdapterConfig::new(&plan.workspace);
    if let Some(shell) = cli.shell {
        config = config.with_shell(shell);
    }
    let mut adapter = BasicAdapter::new(config);

    let output = OutputHandler::new();
    output.print_plan(&plan);

    let engine = Engine::new(Arc::new(TracingReporter), Arc::new(StdoutLogSink::new()));
    let verdict = run_build_plan(&engine, &plan, &mut adapter)
        .await
        .context("Build plan aborted")?;

    output.print_verdict(verdict);
    Ok(verdict)
}

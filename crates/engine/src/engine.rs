//! Execution engine.
//!
//! Drives one adapter through a build plan:
//!
//! 1. open the build log and start draining it into the log sink
//! 2. `prepare` the adapter
//! 3. run every step in order, stopping at the first failure, and start an
//!    artifact publisher for each step that ran
//! 4. `shutdown` the adapter, always
//! 5. close the log, then wait for the drain task and every publisher
//!
//! Nothing started by a run outlives it.

use std::{path::Path, sync::Arc};

use tokio::task::{JoinHandle, JoinSet};

use crate::{
    adapter::Adapter,
    artifacts::{ArtifactMatcher, GlobTreeMatcher, publish_artifacts},
    error::EngineError,
    log::{Log, drain as drain_log},
    plan::BuildPlan,
    reporter::{LogSink, Reporter},
    status::{Status, StepOutcome, Verdict},
    step::{Step, StepSpec},
};

/// Name of the log source the build log is published under.
pub const LOG_SOURCE: &str = "console";

type Publishers = JoinSet<Result<usize, EngineError>>;

pub struct Engine {
    reporter: Arc<dyn Reporter>,
    log_sink: Arc<dyn LogSink>,
    matcher: Arc<dyn ArtifactMatcher>,
}

impl Engine {
    pub fn new(reporter: Arc<dyn Reporter>, log_sink: Arc<dyn LogSink>) -> Self {
        Self {
            reporter,
            log_sink,
            matcher: Arc::new(GlobTreeMatcher),
        }
    }

    /// Replace the artifact matcher.
    pub fn with_matcher(mut self, matcher: Arc<dyn ArtifactMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    /// Run every step of `plan` through `adapter` and return the verdict.
    ///
    /// Step, setup and teardown failures only fail the verdict. An `Err` is
    /// returned when the run has to be aborted: an invalid artifact pattern
    /// or a crashed background task.
    pub async fn run(
        &self,
        plan: &BuildPlan,
        adapter: &mut dyn Adapter,
    ) -> Result<Verdict, EngineError> {
        let (log, stream) = Log::channel();
        let drainer: JoinHandle<usize> = {
            let sink = self.log_sink.clone();
            tokio::spawn(async move { drain_log(stream, LOG_SOURCE, sink.as_ref()).await })
        };
        let mut publishers = Publishers::new();
        let mut fatal: Option<EngineError> = None;

        let mut verdict = match adapter.prepare(&log).await {
            Ok(()) => {
                let (verdict, err) = self.run_steps(plan, adapter, &log, &mut publishers).await;
                fatal = err;
                verdict
            }
            Err(e) => {
                tracing::error!("Failed to prepare adapter: {}", e);
                log.line(format!("Failed to prepare environment: {e}"));
                Verdict::Failed
            }
        };

        if let Err(e) = adapter.shutdown(&log).await {
            tracing::error!("Failed to shut down adapter: {}", e);
            log.line(format!("Failed to shut down environment: {e}"));
            verdict = Verdict::Failed;
        }

        // Closing the log lets the drain task finish once it has caught up.
        drop(log);

        let chunks = drainer.await;
        while let Some(joined) = publishers.join_next().await {
            record_publisher(joined, &mut fatal);
        }
        match chunks {
            Ok(count) => tracing::debug!("Build log drained ({} chunks)", count),
            Err(e) => {
                fatal.get_or_insert(EngineError::BackgroundTask(e));
            }
        }

        match fatal {
            Some(err) => {
                tracing::error!("Aborting run: {}", err);
                Err(err)
            }
            None => {
                tracing::info!("Run finished: {}", verdict);
                Ok(verdict)
            }
        }
    }

    /// Main sequencing loop. Returns the folded verdict and the first fatal
    /// error: a step's malformed artifact pattern, or one seen from an
    /// already finished publisher.
    async fn run_steps(
        &self,
        plan: &BuildPlan,
        adapter: &mut dyn Adapter,
        log: &Log,
        publishers: &mut Publishers,
    ) -> (Verdict, Option<EngineError>) {
        let mut verdict = Verdict::default();
        let mut fatal = None;

        for spec in &plan.steps {
            let step = match Step::new(spec, &plan.workspace) {
                Ok(step) => step,
                Err(e) => {
                    tracing::error!("[{}] Could not create step: {}", spec.id, e);
                    log.line(format!("Could not create step {}: {e}", spec.id));
                    self.reporter
                        .push_status(&spec.id, Status::Finished, Some(StepOutcome::CouldNotStart))
                        .await;
                    verdict = Verdict::Failed;
                    break;
                }
            };

            let outcome = self.run_step(&step, adapter, log).await;
            verdict = verdict.and(outcome);

            if let Err(source) = self.matcher.validate(&spec.artifacts) {
                tracing::error!("[{}] Stopping plan: {}", spec.id, source);
                log.line(format!("Invalid artifact pattern in step {}: {source}", spec.id));
                fatal = Some(EngineError::InvalidArtifactPattern {
                    step_id: spec.id.clone(),
                    source,
                });
                break;
            }
            self.spawn_publisher(publishers, spec, &plan.workspace);

            while let Some(joined) = publishers.try_join_next() {
                record_publisher(joined, &mut fatal);
            }
            if fatal.is_some() {
                tracing::error!("[{}] Stopping plan: artifact collection failed", spec.id);
                break;
            }

            if verdict.is_failed() {
                tracing::info!("[{}] Step failed, skipping remaining steps", spec.id);
                break;
            }
        }

        (verdict, fatal)
    }

    /// Run one step and report its in_progress and finished transitions.
    async fn run_step(&self, step: &Step, adapter: &mut dyn Adapter, log: &Log) -> StepOutcome {
        self.reporter
            .push_status(step.id(), Status::InProgress, None)
            .await;
        tracing::info!("[{}] Running in {}", step.id(), step.cwd().display());

        let result = match adapter.run(step, log).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("[{}] Adapter failed to run step: {}", step.id(), e);
                log.line(format!("Failed to run step {}: {e}", step.id()));
                self.reporter
                    .push_status(step.id(), Status::Finished, Some(StepOutcome::CouldNotStart))
                    .await;
                return StepOutcome::CouldNotStart;
            }
        };

        if !result.success {
            tracing::warn!(
                "[{}] Step failed (exit code {:?})",
                step.id(),
                result.exit_code
            );
            self.reporter
                .push_status(step.id(), Status::Finished, Some(StepOutcome::Failed))
                .await;
            return StepOutcome::Failed;
        }

        if step.capture_output() {
            let output = result.output.unwrap_or_default();
            self.reporter
                .push_output(step.id(), Status::Finished, StepOutcome::Success, &output)
                .await;
        } else {
            self.reporter
                .push_status(step.id(), Status::Finished, Some(StepOutcome::Success))
                .await;
        }
        StepOutcome::Success
    }

    fn spawn_publisher(&self, publishers: &mut Publishers, spec: &StepSpec, workspace: &Path) {
        publishers.spawn(publish_artifacts(
            self.reporter.clone(),
            self.matcher.clone(),
            spec.id.clone(),
            workspace.to_path_buf(),
            spec.artifacts.clone(),
        ));
    }
}

/// Keep the first fatal error out of a joined publisher.
fn record_publisher(
    joined: Result<Result<usize, EngineError>, tokio::task::JoinError>,
    fatal: &mut Option<EngineError>,
) {
    let err = match joined {
        Ok(Ok(_)) => return,
        Ok(Err(e)) => e,
        Err(e) => EngineError::BackgroundTask(e),
    };
    if fatal.is_none() {
        *fatal = Some(err);
    } else {
        tracing::error!("Additional background failure: {}", err);
    }
}

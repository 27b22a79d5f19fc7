//! Job-level lifecycle around a single engine run.

use crate::{
    adapter::Adapter,
    engine::Engine,
    error::EngineError,
    plan::BuildPlan,
    status::{Status, Verdict},
};

/// Report the job as in progress, run the plan and report it finished with
/// the verdict.
///
/// When the run aborts the job is still reported finished (failed) before
/// the error is handed back.
pub async fn run_build_plan(
    engine: &Engine,
    plan: &BuildPlan,
    adapter: &mut dyn Adapter,
) -> Result<Verdict, EngineError> {
    let reporter = engine.reporter();
    reporter.push_job_status(Status::InProgress, None).await;

    match engine.run(plan, adapter).await {
        Ok(verdict) => {
            reporter
                .push_job_status(Status::Finished, Some(verdict))
                .await;
            Ok(verdict)
        }
        Err(e) => {
            reporter
                .push_job_status(Status::Finished, Some(Verdict::Failed))
                .await;
            Err(e)
        }
    }
}

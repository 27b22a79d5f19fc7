//! Build plan execution engine.
//!
//! Sequences an [`Adapter`] through the steps of a [`BuildPlan`], streams the
//! build log to a [`LogSink`], publishes declared artifacts and reports step
//! and job status to a [`Reporter`].

pub mod adapter;
pub mod artifacts;
pub mod controller;
pub mod engine;
pub mod error;
pub mod log;
pub mod plan;
pub mod reporter;
pub mod status;
pub mod step;

pub use adapter::{Adapter, AdapterError};
pub use artifacts::{ArtifactMatcher, GlobTreeMatcher};
pub use controller::run_build_plan;
pub use engine::{Engine, LOG_SOURCE};
pub use error::EngineError;
pub use log::{Log, LogChunk, LogStream};
pub use plan::{BuildPlan, PlanError};
pub use reporter::{LogSink, MemoryLogSink, MemoryReporter, ReportEvent, Reporter, TracingReporter};
pub use status::{Status, StepOutcome, Verdict};
pub use step::{Step, StepError, StepResult, StepSpec};

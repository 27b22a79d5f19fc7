//! The environment a plan runs in.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    log::Log,
    step::{Step, StepResult},
};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Other(String),
}

/// Prepares an execution environment, runs steps inside it and tears it down.
///
/// The engine calls `prepare` once, `run` once per step in plan order and
/// `shutdown` exactly once at the end, including after a failed `prepare`.
/// Output written to the borrowed [`Log`] reaches the build log in order.
#[async_trait]
pub trait Adapter: Send {
    async fn prepare(&mut self, log: &Log) -> Result<(), AdapterError>;

    async fn run(&mut self, step: &Step, log: &Log) -> Result<StepResult, AdapterError>;

    async fn shutdown(&mut self, log: &Log) -> Result<(), AdapterError>;
}

use std::{
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;

use super::{LogSink, Reporter};
use crate::{
    log::LogChunk,
    status::{Status, StepOutcome, Verdict},
};

/// One recorded call on a [`MemoryReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Status {
        step_id: String,
        status: Status,
        outcome: Option<StepOutcome>,
    },
    Output {
        step_id: String,
        status: Status,
        outcome: StepOutcome,
        output: Vec<u8>,
    },
    Job {
        status: Status,
        verdict: Option<Verdict>,
    },
    Artifacts(Vec<PathBuf>),
}

impl ReportEvent {
    /// Step this event belongs to, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            ReportEvent::Status { step_id, .. } | ReportEvent::Output { step_id, .. } => {
                Some(step_id.as_str())
            }
            _ => None,
        }
    }
}

/// Reporter that keeps every call in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.lock().clone()
    }

    /// Status and output events for one step.
    pub fn step_events(&self, step_id: &str) -> Vec<ReportEvent> {
        self.lock()
            .iter()
            .filter(|e| e.step_id() == Some(step_id))
            .cloned()
            .collect()
    }

    /// Every artifact batch, in publication order.
    pub fn artifact_batches(&self) -> Vec<Vec<PathBuf>> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Artifacts(paths) => Some(paths.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ReportEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ReportEvent>> {
        // A panic while holding the lock leaves the vector intact.
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Reporter for MemoryReporter {
    async fn push_status(&self, step_id: &str, status: Status, outcome: Option<StepOutcome>) {
        self.record(ReportEvent::Status {
            step_id: step_id.to_string(),
            status,
            outcome,
        });
    }

    async fn push_output(&self, step_id: &str, status: Status, outcome: StepOutcome, output: &[u8]) {
        self.record(ReportEvent::Output {
            step_id: step_id.to_string(),
            status,
            outcome,
            output: output.to_vec(),
        });
    }

    async fn push_job_status(&self, status: Status, verdict: Option<Verdict>) {
        self.record(ReportEvent::Job { status, verdict });
    }

    async fn push_artifacts(&self, paths: &[PathBuf]) {
        self.record(ReportEvent::Artifacts(paths.to_vec()));
    }
}

/// Log sink that keeps every chunk in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    chunks: Mutex<Vec<(String, LogChunk)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenation of every chunk received so far.
    pub fn contents(&self) -> Vec<u8> {
        self.lock()
            .iter()
            .flat_map(|(_, chunk)| chunk.bytes().iter().copied())
            .collect()
    }

    pub fn sources(&self) -> Vec<String> {
        self.lock().iter().map(|(source, _)| source.clone()).collect()
    }

    pub fn chunk_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, LogChunk)>> {
        self.chunks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn push_chunk(&self, source: &str, chunk: &LogChunk) {
        self.lock().push((source.to_string(), chunk.clone()));
    }
}

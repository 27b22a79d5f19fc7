//! Status, outcome and verdict types shared by step and job reports.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Lifecycle position of a step or of the whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    Queued,
    InProgress,
    Finished,
}

/// How a finished step ended.
///
/// `CouldNotStart` is a tooling failure (the step never ran or the adapter
/// errored while running it); `Failed` means the step ran and reported an
/// unsuccessful result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Failed,
    CouldNotStart,
}

impl StepOutcome {
    /// Legacy exit-code encoding understood by older reporting backends.
    pub fn exit_code(self) -> i32 {
        match self {
            StepOutcome::Success => 0,
            StepOutcome::Failed => 1,
            StepOutcome::CouldNotStart => 255,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, StepOutcome::Success)
    }
}

/// Plan-level pass/fail outcome.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Verdict {
    #[default]
    Passed,
    Failed,
}

impl Verdict {
    /// Fold another outcome into this verdict. `Failed` absorbs.
    #[must_use]
    pub fn and(self, other: impl Into<Verdict>) -> Verdict {
        match (self, other.into()) {
            (Verdict::Passed, Verdict::Passed) => Verdict::Passed,
            _ => Verdict::Failed,
        }
    }

    pub fn is_passed(self) -> bool {
        matches!(self, Verdict::Passed)
    }

    pub fn is_failed(self) -> bool {
        !self.is_passed()
    }
}

impl From<StepOutcome> for Verdict {
    fn from(outcome: StepOutcome) -> Self {
        if outcome.is_success() {
            Verdict::Passed
        } else {
            Verdict::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_exit_codes() {
        assert_eq!(StepOutcome::Success.exit_code(), 0);
        assert_eq!(StepOutcome::Failed.exit_code(), 1);
        assert_eq!(StepOutcome::CouldNotStart.exit_code(), 255);
    }

    #[test]
    fn verdict_never_upgrades() {
        let verdict = Verdict::default()
            .and(StepOutcome::Success)
            .and(StepOutcome::Failed)
            .and(StepOutcome::Success)
            .and(Verdict::Passed);
        assert_eq!(verdict, Verdict::Failed);
    }

    #[test]
    fn verdict_defaults_to_passed() {
        assert!(Verdict::default().is_passed());
        assert!(Verdict::default().and(StepOutcome::Success).is_passed());
        assert!(Verdict::default().and(StepOutcome::CouldNotStart).is_failed());
    }

    #[test]
    fn names_are_snake_case() {
        assert_eq!(Status::InProgress.to_string(), "in_progress");
        assert_eq!(StepOutcome::CouldNotStart.as_ref(), "could_not_start");
        assert_eq!(
            serde_json::to_string(&Verdict::Failed).unwrap(),
            "\"failed\""
        );
    }
}

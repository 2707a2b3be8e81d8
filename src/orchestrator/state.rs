//! Pipeline stage machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage of a pipeline run. Runs move forward through the list; only
/// `Validating` (or a cancellation) can divert to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Validating,
    Critiquing,
    Generating,
    DerivingSchema,
    DerivingContract,
    Building,
    StaticChecking,
    Testing,
    Packaging,
    Judging,
    Done,
    Aborted,
}

impl PipelineState {
    /// Stages that produce a step record, in execution order.
    pub const STAGES: [PipelineState; 10] = [
        PipelineState::Validating,
        PipelineState::Critiquing,
        PipelineState::Generating,
        PipelineState::DerivingSchema,
        PipelineState::DerivingContract,
        PipelineState::Building,
        PipelineState::StaticChecking,
        PipelineState::Testing,
        PipelineState::Packaging,
        PipelineState::Judging,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Validating => "validating",
            PipelineState::Critiquing => "critiquing",
            PipelineState::Generating => "generating",
            PipelineState::DerivingSchema => "deriving_schema",
            PipelineState::DerivingContract => "deriving_contract",
            PipelineState::Building => "building",
            PipelineState::StaticChecking => "static_checking",
            PipelineState::Testing => "testing",
            PipelineState::Packaging => "packaging",
            PipelineState::Judging => "judging",
            PipelineState::Done => "done",
            PipelineState::Aborted => "aborted",
        }
    }

    /// Short label for progress output.
    pub fn label(self) -> &'static str {
        match self {
            PipelineState::Validating => "Validate spec",
            PipelineState::Critiquing => "Critique spec",
            PipelineState::Generating => "Generate client",
            PipelineState::DerivingSchema => "Derive DB schema",
            PipelineState::DerivingContract => "Derive API contract",
            PipelineState::Building => "Build binary",
            PipelineState::StaticChecking => "Static checks",
            PipelineState::Testing => "Tests",
            PipelineState::Packaging => "Package artifacts",
            PipelineState::Judging => "Judge",
            PipelineState::Done => "Done",
            PipelineState::Aborted => "Aborted",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub from: PipelineState,
    pub to: PipelineState,
    pub at: DateTime<Utc>,
}

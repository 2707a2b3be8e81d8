//! Per-stage records and the run-level `PipelineResult`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::state::{PipelineState, Transition};
use crate::adapters::{BuildOutcome, CodegenOutcome};
use crate::critic::CriticReport;
use crate::derive::{ContractReport, DbReport};
use crate::judge::{Decision, JudgeDecision};
use crate::package::PackageReport;
use crate::verify::{StaticCheckReport, TestReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    /// Completed, but through a fallback path
    Degraded,
    Skipped,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Success => write!(f, "success"),
            StepStatus::Degraded => write!(f, "degraded"),
            StepStatus::Skipped => write!(f, "skipped"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult<T> {
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

impl<T> StepResult<T> {
    pub fn success(output: T, duration: Duration) -> Self {
        Self::with_status(StepStatus::Success, output, duration)
    }

    pub fn degraded(output: T, duration: Duration) -> Self {
        Self::with_status(StepStatus::Degraded, output, duration)
    }

    fn with_status(status: StepStatus, output: T, duration: Duration) -> Self {
        Self {
            status,
            duration_ms: duration.as_millis() as u64,
            output: Some(output),
            error: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: StepStatus::Skipped,
            duration_ms: 0,
            output: None,
            error: None,
        }
    }

    pub fn failed(kind: &str, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            status: StepStatus::Failed,
            duration_ms: duration.as_millis() as u64,
            output: None,
            error: Some(StepError {
                kind: kind.to_string(),
                message: message.into(),
            }),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    pub fn output(&self) -> Option<&T> {
        self.output.as_ref()
    }
}

/// What validation produced.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutput {
    pub schema_version: Option<String>,
    /// Copy of the input spec inside the run directory
    pub spec_copy: PathBuf,
}

/// One slot per stage; a slot is empty when the run never reached the stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSteps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate: Option<StepResult<ValidationOutput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critic: Option<StepResult<CriticReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codegen: Option<StepResult<CodegenOutcome>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_schema: Option<StepResult<DbReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<StepResult<ContractReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<StepResult<BuildOutcome>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_checks: Option<StepResult<StaticCheckReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<StepResult<TestReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<StepResult<PackageReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge: Option<StepResult<JudgeDecision>>,
}

impl PipelineSteps {
    /// `(stage, status)` for every recorded step, in stage order.
    pub fn statuses(&self) -> Vec<(PipelineState, StepStatus)> {
        [
            (PipelineState::Validating, self.validate.as_ref().map(|s| s.status)),
            (PipelineState::Critiquing, self.critic.as_ref().map(|s| s.status)),
            (PipelineState::Generating, self.codegen.as_ref().map(|s| s.status)),
            (PipelineState::DerivingSchema, self.db_schema.as_ref().map(|s| s.status)),
            (PipelineState::DerivingContract, self.contract.as_ref().map(|s| s.status)),
            (PipelineState::Building, self.build.as_ref().map(|s| s.status)),
            (PipelineState::StaticChecking, self.static_checks.as_ref().map(|s| s.status)),
            (PipelineState::Testing, self.tests.as_ref().map(|s| s.status)),
            (PipelineState::Packaging, self.package.as_ref().map(|s| s.status)),
            (PipelineState::Judging, self.judge.as_ref().map(|s| s.status)),
        ]
        .into_iter()
        .filter_map(|(stage, status)| status.map(|s| (stage, s)))
        .collect()
    }

    /// Errors of failed steps, in stage order.
    pub fn errors(&self) -> Vec<(PipelineState, &StepError)> {
        fn failure<T>(step: &Option<StepResult<T>>) -> Option<&StepError> {
            step.as_ref()
                .filter(|s| s.is_failed())
                .and_then(|s| s.error.as_ref())
        }
        [
            (PipelineState::Validating, failure(&self.validate)),
            (PipelineState::Generating, failure(&self.codegen)),
            (PipelineState::DerivingSchema, failure(&self.db_schema)),
            (PipelineState::DerivingContract, failure(&self.contract)),
            (PipelineState::Building, failure(&self.build)),
            (PipelineState::Packaging, failure(&self.package)),
        ]
        .into_iter()
        .filter_map(|(stage, error)| error.map(|e| (stage, e)))
        .collect()
    }

    pub fn status_of(&self, stage: PipelineState) -> Option<StepStatus> {
        self.statuses()
            .into_iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, status)| status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Success,
    /// Accepted, but the client came from the fallback scaffold
    DegradedSuccess,
    Revise,
    Aborted,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Success => write!(f, "success"),
            Verdict::DegradedSuccess => write!(f, "degraded-success"),
            Verdict::Revise => write!(f, "revise"),
            Verdict::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Run id as resolved (or as supplied, when it was rejected)
    pub run_id: String,
    pub dry_run: bool,
    pub build_binary: bool,
    pub state: PipelineState,
    pub verdict: Verdict,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub transitions: Vec<Transition>,
    pub steps: PipelineSteps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    pub reason: String,
    pub success: bool,
    /// `<work_dir>/<run_id>`, absent when validation never created it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_dir: Option<PathBuf>,
}

impl PipelineResult {
    /// Process exit code: 0 accept, 1 revise, 2 aborted.
    pub fn exit_code(&self) -> u8 {
        match self.verdict {
            Verdict::Success | Verdict::DegradedSuccess => 0,
            Verdict::Revise => 1,
            Verdict::Aborted => 2,
        }
    }
}

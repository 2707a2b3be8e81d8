//! Progress callbacks for pipeline runs.

use std::time::Duration;

use super::result::{PipelineResult, StepStatus};
use super::state::PipelineState;

/// Receives stage lifecycle events. All methods default to no-ops so
/// observers only implement what they render.
pub trait StageObserver: Send + Sync {
    fn stage_started(&self, _stage: PipelineState) {}

    fn stage_finished(&self, _stage: PipelineState, _status: StepStatus, _duration: Duration) {}

    fn run_finished(&self, _result: &PipelineResult) {}
}

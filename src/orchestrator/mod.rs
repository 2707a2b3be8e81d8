pub mod observer;
pub mod pipeline;
pub mod result;
pub mod state;

pub use observer::StageObserver;
pub use pipeline::{Orchestrator, RESULT_FILE, RunLayout, RunRequest};
pub use result::{PipelineResult, PipelineSteps, StepError, StepResult, StepStatus, Verdict};
pub use state::{PipelineState, Transition};

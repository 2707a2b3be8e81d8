//! Stage sequencing for a single run.
//!
//! `Orchestrator::run` never returns an error: every stage outcome, fatal or
//! not, lands in the returned `PipelineResult`. Only a spec that fails to
//! validate (or a cancellation) aborts the run; every other failure is
//! recorded on its step and the pipeline moves on.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::observer::StageObserver;
use super::result::{PipelineResult, PipelineSteps, StepResult, StepStatus, ValidationOutput, Verdict};
use super::state::{PipelineState, Transition};
use crate::adapters::{
    BuildAdapter, BuildRequest, CodegenAdapter, CodegenMode, CodegenRequest, CodegenVars,
    FlutterBuild, FlutterCodegen, Toolchain,
};
use crate::config::AppForgeConfig;
use crate::critic::critique;
use crate::derive::entities::write_schema_artifacts;
use crate::derive::contract::write_contract_artifacts;
use crate::derive::{Entity, derive_entities};
use crate::errors::{PackagingError, SpecError, ToolError};
use crate::judge::{JudgeDecision, judge};
use crate::package::{PackageContext, Packager};
use crate::run_id::RunId;
use crate::spec::{SchemaRegistry, SpecDocument, SpecFormat, load_spec};
use crate::util::write_json_pretty;
use crate::verify::{StubVerifier, Verifier};

/// Written into the run directory once the run ends.
pub const RESULT_FILE: &str = "pipeline_result.json";

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub spec_path: PathBuf,
    /// Caller-supplied id; a UUIDv4 is generated when absent
    pub run_id: Option<String>,
    pub build_binary: bool,
}

impl RunRequest {
    pub fn new(spec_path: impl Into<PathBuf>) -> Self {
        Self {
            spec_path: spec_path.into(),
            run_id: None,
            build_binary: false,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_build_binary(mut self, build_binary: bool) -> Self {
        self.build_binary = build_binary;
        self
    }
}

/// Directory layout of one run.
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub run_dir: PathBuf,
    pub app_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl RunLayout {
    pub fn new(run_dir: PathBuf) -> Self {
        Self {
            app_dir: run_dir.join("app"),
            artifacts_dir: run_dir.join("artifacts"),
            logs_dir: run_dir.join("logs"),
            run_dir,
        }
    }

    /// Create the stage directories inside an already claimed run dir.
    fn create(&self) -> Result<(), SpecError> {
        for dir in [&self.artifacts_dir, &self.logs_dir] {
            std::fs::create_dir_all(dir).map_err(|source| SpecError::RunDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Everything validation hands to the later stages.
struct ValidatedRun {
    run_id: RunId,
    spec: SpecDocument,
    layout: RunLayout,
    spec_copy: PathBuf,
}

/// Runs specs through the full stage sequence.
///
/// Construct once with [`Orchestrator::init`]; the schema registry and the
/// adapters are shared by every run.
pub struct Orchestrator {
    config: AppForgeConfig,
    registry: Arc<SchemaRegistry>,
    codegen: Arc<dyn CodegenAdapter>,
    builder: Arc<dyn BuildAdapter>,
    verifier: Arc<dyn Verifier>,
    observer: Option<Arc<dyn StageObserver>>,
}

impl Orchestrator {
    /// Build an orchestrator from configuration and preload the schema registry.
    pub fn init(config: AppForgeConfig) -> Self {
        let registry = SchemaRegistry::from_config(&config);
        let unavailable = registry.preload();
        info!(
            supported = ?registry.supported_versions(),
            unavailable = unavailable.len(),
            "Schema registry ready"
        );

        let toolchain = Toolchain::new(config.toolchain.clone(), config.pipeline.work_dir.clone());
        Self {
            registry: Arc::new(registry),
            codegen: Arc::new(FlutterCodegen::new(toolchain.clone())),
            builder: Arc::new(FlutterBuild::new(toolchain)),
            verifier: Arc::new(StubVerifier::default()),
            observer: None,
            config,
        }
    }

    pub fn with_codegen(mut self, codegen: impl CodegenAdapter + 'static) -> Self {
        self.codegen = Arc::new(codegen);
        self
    }

    pub fn with_builder(mut self, builder: impl BuildAdapter + 'static) -> Self {
        self.builder = Arc::new(builder);
        self
    }

    pub fn with_verifier(mut self, verifier: impl Verifier + 'static) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &AppForgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub async fn run(&self, request: RunRequest) -> PipelineResult {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    /// Run the pipeline; cancelling `cancel` kills running tools and aborts the run.
    pub async fn run_with_cancel(&self, request: RunRequest, cancel: CancellationToken) -> PipelineResult {
        let resolved_id = match &request.run_id {
            Some(raw) => RunId::parse(raw),
            None => Ok(RunId::generate()),
        };
        let label = match (&resolved_id, &request.run_id) {
            (Ok(id), _) => id.to_string(),
            (Err(_), raw) => raw.clone().unwrap_or_default(),
        };
        let mut run = RunRecord::new(label, request.build_binary, self.observer.as_deref());

        run.enter(PipelineState::Validating);
        let started = Instant::now();
        let validated = match self.validate(&request, resolved_id) {
            Ok(validated) => validated,
            Err(err) => {
                warn!(run_id = %run.run_id, error = %err, "Spec rejected");
                run.steps.validate = Some(StepResult::failed(
                    err.kind(),
                    err.to_error_lines().join("; "),
                    started.elapsed(),
                ));
                run.finish(PipelineState::Validating, StepStatus::Failed, started.elapsed());
                return self.conclude(run.abort(format!("Validation failed: {}", err)));
            }
        };
        run.run_dir = Some(validated.layout.run_dir.clone());
        run.steps.validate = Some(StepResult::success(
            ValidationOutput {
                schema_version: validated.spec.schema_version().map(str::to_string),
                spec_copy: validated.spec_copy.clone(),
            },
            started.elapsed(),
        ));
        run.finish(PipelineState::Validating, StepStatus::Success, started.elapsed());

        let result = self.execute(&mut run, &validated, &request, &cancel).await;
        self.conclude(match result {
            Some(decision) => run.complete(decision),
            None => run.abort("Run cancelled".to_string()),
        })
    }

    /// Load the spec, claim the run id and lay out the run directory.
    fn validate(
        &self,
        request: &RunRequest,
        run_id: Result<RunId, SpecError>,
    ) -> Result<ValidatedRun, SpecError> {
        let spec = load_spec(&request.spec_path, &self.registry)?;
        let run_id = run_id?;
        let layout = RunLayout::new(run_id.claim(&self.config.pipeline.work_dir)?);
        layout.create()?;
        let spec_copy = layout.run_dir.join(format!(
            "spec.{}",
            SpecFormat::from_path(&request.spec_path).extension()
        ));
        std::fs::copy(&request.spec_path, &spec_copy).map_err(|source| SpecError::RunDir {
            path: spec_copy.clone(),
            source,
        })?;

        Ok(ValidatedRun {
            run_id,
            spec,
            layout,
            spec_copy,
        })
    }

    /// Every stage after validation. `None` means the run was cancelled.
    async fn execute(
        &self,
        run: &mut RunRecord<'_>,
        validated: &ValidatedRun,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Option<JudgeDecision> {
        let ValidatedRun {
            run_id,
            spec,
            layout,
            spec_copy,
        } = validated;
        if cancel.is_cancelled() {
            return None;
        }

        // Critic
        run.enter(PipelineState::Critiquing);
        let started = Instant::now();
        let critic = critique(spec);
        if !critic.blocking.is_empty() {
            warn!(run_id = %run_id, blocking = critic.blocking.len(), "Critic found blocking issues");
        }
        run.steps.critic = Some(StepResult::success(critic.clone(), started.elapsed()));
        run.finish(PipelineState::Critiquing, StepStatus::Success, started.elapsed());

        // Codegen
        run.enter(PipelineState::Generating);
        let started = Instant::now();
        let codegen_request = CodegenRequest {
            run_id: run_id.to_string(),
            run_dir: layout.run_dir.clone(),
            app_dir: layout.app_dir.clone(),
            logs_dir: layout.logs_dir.clone(),
            vars: CodegenVars::from_spec(spec),
        };
        let step = match self.codegen.generate(&codegen_request, cancel).await {
            Ok(outcome) if outcome.mode == CodegenMode::FallbackScaffold => {
                StepResult::degraded(outcome, started.elapsed())
            }
            Ok(outcome) => StepResult::success(outcome, started.elapsed()),
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "Client generation failed");
                tool_failure(&err, started.elapsed())
            }
        };
        let status = step.status;
        run.steps.codegen = Some(step);
        run.finish(PipelineState::Generating, status, started.elapsed());
        if cancel.is_cancelled() {
            return None;
        }

        // Schema and contract derivation share the entity model and run side by side
        let entities: Arc<Vec<Entity>> = Arc::new(derive_entities(spec));
        run.enter(PipelineState::DerivingSchema);
        run.enter(PipelineState::DerivingContract);
        let schema_task = {
            let entities = Arc::clone(&entities);
            let dir = layout.artifacts_dir.clone();
            let id = run_id.to_string();
            tokio::task::spawn_blocking(move || {
                let started = Instant::now();
                (write_schema_artifacts(&dir, &entities, &id), started.elapsed())
            })
        };
        let contract_task = {
            let entities = Arc::clone(&entities);
            let dir = layout.artifacts_dir.clone();
            let contract = self.config.contract.clone();
            tokio::task::spawn_blocking(move || {
                let started = Instant::now();
                (write_contract_artifacts(&dir, &entities, &contract), started.elapsed())
            })
        };
        let (schema_joined, contract_joined) = tokio::join!(schema_task, contract_task);

        let step = derivation_step(run_id, "schema", schema_joined);
        run.finish(PipelineState::DerivingSchema, step.status, Duration::from_millis(step.duration_ms));
        run.steps.db_schema = Some(step);
        let step = derivation_step(run_id, "contract", contract_joined);
        run.finish(PipelineState::DerivingContract, step.status, Duration::from_millis(step.duration_ms));
        run.steps.contract = Some(step);

        // Build
        run.enter(PipelineState::Building);
        let started = Instant::now();
        let step = if request.build_binary {
            let build_request = BuildRequest {
                run_id: run_id.to_string(),
                app_dir: layout.app_dir.clone(),
                artifacts_dir: layout.artifacts_dir.clone(),
                logs_dir: layout.logs_dir.clone(),
                variant: spec.build_variant(),
                timeout: self.config.toolchain.build_timeout(),
            };
            match self.builder.build(&build_request, cancel).await {
                Ok(outcome) => StepResult::success(outcome, started.elapsed()),
                Err(err) => {
                    warn!(run_id = %run_id, error = %err, "Build failed");
                    tool_failure(&err, started.elapsed())
                }
            }
        } else {
            info!(run_id = %run_id, "Binary build disabled, skipping");
            StepResult::skipped()
        };
        let status = step.status;
        run.steps.build = Some(step);
        run.finish(PipelineState::Building, status, started.elapsed());
        if cancel.is_cancelled() {
            return None;
        }

        // Verification
        run.enter(PipelineState::StaticChecking);
        let started = Instant::now();
        let static_report = self.verifier.static_check(&layout.app_dir).await;
        run.steps.static_checks = Some(StepResult::success(static_report.clone(), started.elapsed()));
        run.finish(PipelineState::StaticChecking, StepStatus::Success, started.elapsed());

        run.enter(PipelineState::Testing);
        let started = Instant::now();
        let test_report = self.verifier.run_tests(&layout.app_dir).await;
        run.steps.tests = Some(StepResult::success(test_report.clone(), started.elapsed()));
        run.finish(PipelineState::Testing, StepStatus::Success, started.elapsed());
        if cancel.is_cancelled() {
            return None;
        }

        // Packaging
        run.enter(PipelineState::Packaging);
        let started = Instant::now();
        let packager = Packager::new(&layout.app_dir, &layout.artifacts_dir);
        let context = PackageContext {
            run_id,
            spec,
            spec_copy: Some(spec_copy.as_path()),
            entities: &entities,
            critic: &critic,
            static_checks: &static_report,
            tests: &test_report,
        };
        let step = match packager.package(&context) {
            Ok(report) => StepResult::success(report, started.elapsed()),
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "Packaging failed");
                StepResult::failed(err.kind(), err.to_string(), started.elapsed())
            }
        };
        let status = step.status;
        run.steps.package = Some(step);
        run.finish(PipelineState::Packaging, status, started.elapsed());

        // Judge
        run.enter(PipelineState::Judging);
        let started = Instant::now();
        let decision = judge(&critic, &static_report, &test_report);
        if let Err(err) = packager.finalize(&decision) {
            warn!(run_id = %run_id, error = %err, "Failed to record judge decision in artifacts");
        }
        info!(run_id = %run_id, decision = %decision.decision, reason = %decision.reason, "Judge decided");
        run.steps.judge = Some(StepResult::success(decision.clone(), started.elapsed()));
        run.finish(PipelineState::Judging, StepStatus::Success, started.elapsed());

        Some(decision)
    }

    /// Persist the result next to the run and notify the observer.
    fn conclude(&self, result: PipelineResult) -> PipelineResult {
        if let Some(run_dir) = &result.run_dir {
            let path = run_dir.join(RESULT_FILE);
            if let Err(e) = write_json_pretty(&path, &result) {
                warn!(path = %path.display(), error = %e, "Failed to write pipeline result");
            }
        }
        info!(
            run_id = %result.run_id,
            verdict = %result.verdict,
            success = result.success,
            "Run finished"
        );
        if let Some(observer) = &self.observer {
            observer.run_finished(&result);
        }
        result
    }
}

fn tool_failure<T>(err: &ToolError, duration: Duration) -> StepResult<T> {
    let message = match err.output() {
        Some(output) if !output.trim().is_empty() => format!("{}\n{}", err, output.trim_end()),
        _ => err.to_string(),
    };
    StepResult::failed(err.kind(), message, duration)
}

fn derivation_step<T>(
    run_id: &RunId,
    what: &str,
    joined: Result<(Result<T, PackagingError>, Duration), JoinError>,
) -> StepResult<T> {
    match joined {
        Ok((Ok(report), duration)) => StepResult::success(report, duration),
        Ok((Err(err), duration)) => {
            warn!(run_id = %run_id, error = %err, "Failed to write {} artifacts", what);
            StepResult::failed(err.kind(), err.to_string(), duration)
        }
        Err(err) => {
            warn!(run_id = %run_id, error = %err, "{} derivation task failed", what);
            StepResult::failed("InternalError", err.to_string(), Duration::ZERO)
        }
    }
}

/// Mutable bookkeeping for a run in flight.
struct RunRecord<'a> {
    run_id: String,
    build_binary: bool,
    state: PipelineState,
    started_at: chrono::DateTime<Utc>,
    transitions: Vec<Transition>,
    steps: PipelineSteps,
    run_dir: Option<PathBuf>,
    observer: Option<&'a dyn StageObserver>,
}

impl<'a> RunRecord<'a> {
    fn new(run_id: String, build_binary: bool, observer: Option<&'a dyn StageObserver>) -> Self {
        Self {
            run_id,
            build_binary,
            state: PipelineState::Validating,
            started_at: Utc::now(),
            transitions: Vec::new(),
            steps: PipelineSteps::default(),
            run_dir: None,
            observer,
        }
    }

    fn transition(&mut self, to: PipelineState) {
        if self.state != to {
            self.transitions.push(Transition {
                from: self.state,
                to,
                at: Utc::now(),
            });
            self.state = to;
        }
    }

    fn enter(&mut self, stage: PipelineState) {
        self.transition(stage);
        info!(run_id = %self.run_id, stage = %stage, "Stage started");
        if let Some(observer) = self.observer {
            observer.stage_started(stage);
        }
    }

    fn finish(&self, stage: PipelineState, status: StepStatus, duration: Duration) {
        info!(
            run_id = %self.run_id,
            stage = %stage,
            status = %status,
            duration_ms = duration.as_millis() as u64,
            "Stage finished"
        );
        if let Some(observer) = self.observer {
            observer.stage_finished(stage, status, duration);
        }
    }

    fn abort(mut self, reason: String) -> PipelineResult {
        self.transition(PipelineState::Aborted);
        self.into_result(Verdict::Aborted, None, reason)
    }

    fn complete(mut self, decision: JudgeDecision) -> PipelineResult {
        self.transition(PipelineState::Done);
        let verdict = if !decision.accepted() {
            Verdict::Revise
        } else if self.steps.status_of(PipelineState::Generating) == Some(StepStatus::Degraded) {
            Verdict::DegradedSuccess
        } else {
            Verdict::Success
        };
        let reason = decision.reason.clone();
        self.into_result(verdict, Some(decision), reason)
    }

    fn into_result(self, verdict: Verdict, decision: Option<JudgeDecision>, reason: String) -> PipelineResult {
        let success = decision.as_ref().is_some_and(JudgeDecision::accepted);
        PipelineResult {
            run_id: self.run_id,
            dry_run: !self.build_binary,
            build_binary: self.build_binary,
            state: self.state,
            verdict,
            started_at: self.started_at,
            finished_at: Utc::now(),
            transitions: self.transitions,
            steps: self.steps,
            decision: decision.map(|d| d.decision),
            reason,
            success,
            run_dir: self.run_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{BuildOutcome, CodegenOutcome};
    use crate::config::ToolchainMode;
    use crate::judge::Decision;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::{TempDir, tempdir};

    const SPEC: &str = include_str!("../../tests/fixtures/valid_spec.yaml");

    fn setup() -> (TempDir, AppForgeConfig, PathBuf) {
        let dir = tempdir().unwrap();
        let mut config = AppForgeConfig::default();
        config.pipeline.work_dir = dir.path().join("work");
        config.pipeline.schema_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schemas");
        config.toolchain.mode = ToolchainMode::Scaffold;
        let spec_path = dir.path().join("spec.yaml");
        std::fs::write(&spec_path, SPEC).unwrap();
        (dir, config, spec_path)
    }

    /// Scaffolds the app tree and reports it as a fallback.
    struct FallbackCodegen;

    #[async_trait]
    impl CodegenAdapter for FallbackCodegen {
        async fn generate(
            &self,
            request: &CodegenRequest,
            _cancel: &CancellationToken,
        ) -> Result<CodegenOutcome, ToolError> {
            crate::adapters::scaffold::write_scaffold(&request.app_dir, &request.vars)?;
            Ok(CodegenOutcome {
                app_dir: request.app_dir.clone(),
                mode: CodegenMode::FallbackScaffold,
                vars_path: request.run_dir.join("vars.json"),
                fallback_reason: Some("docker not found".into()),
            })
        }
    }

    struct TimingOutBuild;

    #[async_trait]
    impl BuildAdapter for TimingOutBuild {
        async fn build(
            &self,
            _request: &BuildRequest,
            _cancel: &CancellationToken,
        ) -> Result<BuildOutcome, ToolError> {
            Err(ToolError::Timeout {
                tool: "flutter".into(),
                timeout: Duration::from_secs(1),
                output: "Running Gradle task 'assembleDebug'...".into(),
            })
        }
    }

    /// Cancels the run from inside the build stage.
    struct CancellingBuild;

    #[async_trait]
    impl BuildAdapter for CancellingBuild {
        async fn build(
            &self,
            _request: &BuildRequest,
            cancel: &CancellationToken,
        ) -> Result<BuildOutcome, ToolError> {
            cancel.cancel();
            Err(ToolError::Cancelled {
                tool: "flutter".into(),
            })
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl StageObserver for Recorder {
        fn stage_started(&self, stage: PipelineState) {
            self.events.lock().unwrap().push(format!("start {}", stage));
        }

        fn stage_finished(&self, stage: PipelineState, status: StepStatus, _duration: Duration) {
            self.events.lock().unwrap().push(format!("end {} {}", stage, status));
        }

        fn run_finished(&self, result: &PipelineResult) {
            self.events.lock().unwrap().push(format!("done {}", result.verdict));
        }
    }

    #[tokio::test]
    async fn test_scaffold_run_is_accepted_and_build_skipped() {
        let (_dir, config, spec_path) = setup();
        let orchestrator = Orchestrator::init(config);
        let result = orchestrator
            .run(RunRequest::new(&spec_path).with_run_id("scaffold-1"))
            .await;

        assert_eq!(result.verdict, Verdict::Success);
        assert_eq!(result.decision, Some(Decision::Accept));
        assert!(result.success);
        assert!(result.dry_run);
        assert_eq!(result.state, PipelineState::Done);
        assert_eq!(result.steps.status_of(PipelineState::Building), Some(StepStatus::Skipped));
        assert_eq!(result.steps.status_of(PipelineState::Generating), Some(StepStatus::Success));

        let run_dir = result.run_dir.clone().unwrap();
        assert!(run_dir.join("spec.yaml").is_file());
        assert!(run_dir.join("vars.json").is_file());
        assert!(run_dir.join(RESULT_FILE).is_file());
        assert!(run_dir.join("app/pubspec.yaml").is_file());

        let stages: Vec<PipelineState> = result.transitions.iter().map(|t| t.to).collect();
        assert_eq!(&stages[..9], &PipelineState::STAGES[1..]);
        assert_eq!(stages.last(), Some(&PipelineState::Done));
    }

    #[tokio::test]
    async fn test_fallback_codegen_gives_degraded_success() {
        let (_dir, config, spec_path) = setup();
        let orchestrator = Orchestrator::init(config).with_codegen(FallbackCodegen);
        let result = orchestrator.run(RunRequest::new(&spec_path)).await;

        assert_eq!(result.steps.status_of(PipelineState::Generating), Some(StepStatus::Degraded));
        assert_eq!(result.verdict, Verdict::DegradedSuccess);
        assert!(result.success);
        assert_eq!(result.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_build_timeout_is_recorded_and_run_continues() {
        let (_dir, config, spec_path) = setup();
        let orchestrator = Orchestrator::init(config).with_builder(TimingOutBuild);
        let result = orchestrator
            .run(RunRequest::new(&spec_path).with_build_binary(true))
            .await;

        let build = result.steps.build.as_ref().unwrap();
        assert_eq!(build.status, StepStatus::Failed);
        let error = build.error.as_ref().unwrap();
        assert_eq!(error.kind, "ExternalToolTimeout");
        assert!(error.message.contains("assembleDebug"));

        assert!(!result.dry_run);
        assert_eq!(result.steps.status_of(PipelineState::Packaging), Some(StepStatus::Success));
        assert_eq!(result.state, PipelineState::Done);
        assert_eq!(result.verdict, Verdict::Success);
    }

    #[tokio::test]
    async fn test_failing_verifier_gives_revise() {
        let (_dir, config, spec_path) = setup();
        let orchestrator = Orchestrator::init(config).with_verifier(StubVerifier::new(true, false));
        let result = orchestrator.run(RunRequest::new(&spec_path)).await;

        assert_eq!(result.verdict, Verdict::Revise);
        assert_eq!(result.decision, Some(Decision::Revise));
        assert!(!result.success);
        assert_eq!(result.reason, "Failing gates: tests");
        assert_eq!(result.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_and_keeps_partial_artifacts() {
        let (_dir, config, spec_path) = setup();
        let orchestrator = Orchestrator::init(config).with_builder(CancellingBuild);
        let result = orchestrator
            .run(RunRequest::new(&spec_path).with_build_binary(true))
            .await;

        assert_eq!(result.state, PipelineState::Aborted);
        assert_eq!(result.verdict, Verdict::Aborted);
        assert!(!result.success);
        assert_eq!(result.decision, None);
        assert_eq!(result.steps.build.as_ref().unwrap().error.as_ref().unwrap().kind, "Cancelled");
        assert!(result.steps.package.is_none());

        let run_dir = result.run_dir.clone().unwrap();
        assert!(run_dir.join("artifacts/openapi.yaml").is_file());
        assert!(run_dir.join(RESULT_FILE).is_file());
    }

    #[tokio::test]
    async fn test_reused_run_id_is_rejected() {
        let (_dir, config, spec_path) = setup();
        let orchestrator = Orchestrator::init(config);
        let first = orchestrator.run(RunRequest::new(&spec_path).with_run_id("same")).await;
        assert!(first.success);

        let second = orchestrator.run(RunRequest::new(&spec_path).with_run_id("same")).await;
        assert_eq!(second.verdict, Verdict::Aborted);
        assert_eq!(second.run_dir, None);
        assert_eq!(
            second.steps.validate.as_ref().unwrap().error.as_ref().unwrap().kind,
            "RunIdRejected"
        );
    }

    #[tokio::test]
    async fn test_invalid_run_id_creates_nothing() {
        let (dir, config, spec_path) = setup();
        let orchestrator = Orchestrator::init(config);
        let result = orchestrator
            .run(RunRequest::new(&spec_path).with_run_id("../escape"))
            .await;

        assert_eq!(result.state, PipelineState::Aborted);
        assert_eq!(result.run_id, "../escape");
        assert!(!dir.path().join("work").exists());
        assert!(!dir.path().join("escape").exists());
    }

    #[tokio::test]
    async fn test_observer_sees_every_stage() {
        let (_dir, config, spec_path) = setup();
        let recorder = Arc::new(Recorder::default());
        let orchestrator = Orchestrator::init(config).with_observer(recorder.clone());
        orchestrator.run(RunRequest::new(&spec_path)).await;

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.first().map(String::as_str), Some("start validating"));
        assert!(events.contains(&"end building skipped".to_string()));
        assert!(events.contains(&"end judging success".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("done success"));
        let starts = events.iter().filter(|e| e.starts_with("start ")).count();
        assert_eq!(starts, PipelineState::STAGES.len());
    }
}

//! End-to-end pipeline tests driving the library with fake adapters.

use appforge::adapters::{
    BuildAdapter, BuildOutcome, BuildRequest, CodegenAdapter, CodegenMode, CodegenOutcome,
    CodegenRequest,
};
use appforge::config::{AppForgeConfig, ToolchainMode};
use appforge::errors::ToolError;
use appforge::judge::Decision;
use appforge::orchestrator::{Orchestrator, PipelineState, RunRequest, StepStatus, Verdict};
use appforge::package::ChecksumManifest;
use appforge::verify::StubVerifier;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};
use tokio_util::sync::CancellationToken;

const USER_SPEC: &str = r#"
meta:
  schema_version: "0.1.0"
app:
  name: Contacts
  bundle_id_android: com.example.contacts
data:
  entities:
    - name: User
      fields:
        - { name: email, type: string, required: true }
ui:
  screens:
    - name: People
      widgets:
        - { type: List, source: User }
ci:
  android:
    build_variant: debug
"#;

/// Writes a tiny Flutter tree, including the platform dir the build needs.
struct FakeCodegen;

#[async_trait]
impl CodegenAdapter for FakeCodegen {
    async fn generate(
        &self,
        request: &CodegenRequest,
        _cancel: &CancellationToken,
    ) -> Result<CodegenOutcome, ToolError> {
        let app = &request.app_dir;
        fs::create_dir_all(app.join("lib")).unwrap();
        fs::create_dir_all(app.join("android/app")).unwrap();
        fs::write(app.join("pubspec.yaml"), "name: contacts\n").unwrap();
        fs::write(app.join("lib/main.dart"), "void main() {}\n").unwrap();
        fs::write(app.join("android/app/build.gradle"), "// gradle\n").unwrap();
        Ok(CodegenOutcome {
            app_dir: app.clone(),
            mode: CodegenMode::Toolchain,
            vars_path: request.run_dir.join("vars.json"),
            fallback_reason: None,
        })
    }
}

/// Generates like [`FakeCodegen`], then leaves a directory where one artifact file belongs.
struct BlockingCodegen {
    artifact: &'static str,
}

#[async_trait]
impl CodegenAdapter for BlockingCodegen {
    async fn generate(
        &self,
        request: &CodegenRequest,
        cancel: &CancellationToken,
    ) -> Result<CodegenOutcome, ToolError> {
        let outcome = FakeCodegen.generate(request, cancel).await?;
        fs::create_dir_all(request.run_dir.join("artifacts").join(self.artifact)).unwrap();
        Ok(outcome)
    }
}

/// Leaves an APK where `flutter build apk` would.
struct FakeBuild;

#[async_trait]
impl BuildAdapter for FakeBuild {
    async fn build(
        &self,
        request: &BuildRequest,
        _cancel: &CancellationToken,
    ) -> Result<BuildOutcome, ToolError> {
        let outputs = request.app_dir.join("build/app/outputs/flutter-apk");
        fs::create_dir_all(&outputs).unwrap();
        fs::write(outputs.join("app-debug.apk"), b"PK fake apk").unwrap();
        let binary = request.artifacts_dir.join("app-debug.apk");
        let size_bytes = fs::copy(outputs.join("app-debug.apk"), &binary).unwrap();
        Ok(BuildOutcome {
            binary,
            variant: request.variant,
            size_bytes,
            duration_ms: 1,
        })
    }
}

fn setup(spec: &str, file_name: &str) -> (TempDir, AppForgeConfig, PathBuf) {
    let dir = tempdir().unwrap();
    let mut config = AppForgeConfig::default();
    config.pipeline.work_dir = dir.path().join("work");
    config.pipeline.schema_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schemas");
    config.toolchain.mode = ToolchainMode::Scaffold;
    let spec_path = dir.path().join(file_name);
    fs::write(&spec_path, spec).unwrap();
    (dir, config, spec_path)
}

fn orchestrator(config: AppForgeConfig) -> Orchestrator {
    Orchestrator::init(config)
        .with_codegen(FakeCodegen)
        .with_builder(FakeBuild)
        .with_verifier(StubVerifier::passing())
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

#[tokio::test]
async fn test_user_spec_is_accepted_end_to_end() {
    let (_dir, config, spec_path) = setup(USER_SPEC, "contacts.yaml");
    let result = orchestrator(config)
        .run(RunRequest::new(&spec_path).with_run_id("e2e").with_build_binary(true))
        .await;

    assert_eq!(result.state, PipelineState::Done);
    assert_eq!(result.verdict, Verdict::Success);
    assert_eq!(result.decision, Some(Decision::Accept));
    assert!(result.success);
    assert!(!result.dry_run);
    for (stage, status) in result.steps.statuses() {
        assert_eq!(status, StepStatus::Success, "{stage} did not succeed");
    }

    let run_dir = result.run_dir.clone().unwrap();
    let artifacts = run_dir.join("artifacts");

    // Schema: exactly one table with the required email column
    let sql = read(&artifacts.join("db_schema.sql"));
    assert_eq!(sql.matches("CREATE TABLE").count(), 1);
    assert!(sql.contains("CREATE TABLE user (\n    email TEXT NOT NULL\n);"));
    let migration = read(&artifacts.join("db_migration_0001.sql"));
    assert!(migration.starts_with("-- Migration 0001"));
    assert!(migration.contains("-- Run: e2e"));
    assert!(migration.ends_with(&sql));

    // Contract: health plus five CRUD endpoints
    let contract = result.steps.contract.as_ref().unwrap().output().unwrap();
    assert_eq!(contract.endpoints_detected, 6);
    let openapi: serde_json::Value =
        serde_yaml::from_str(&read(&artifacts.join("openapi.yaml"))).unwrap();
    let paths = openapi["paths"].as_object().unwrap();
    assert_eq!(
        paths.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["/health", "/users", "/users/{id}"]
    );
    assert!(paths["/users"]["get"].is_object());
    assert!(paths["/users"]["post"].is_object());
    for method in ["get", "put", "delete"] {
        assert!(paths["/users/{id}"][method].is_object(), "{method} /users/{{id}}");
    }
    assert!(read(&artifacts.join("dart_client/lib/forge_client.dart")).contains("class User"));

    // Bundle: binary, spec copy and a manifest matching the files on disk
    assert!(artifacts.join("app-debug.apk").is_file());
    assert!(artifacts.join("spec.yaml").is_file());
    let manifest = ChecksumManifest::parse(&read(&artifacts.join("checksums.txt")));
    let on_disk = ChecksumManifest::compute(&artifacts).unwrap();
    assert_eq!(manifest, on_disk);
    assert!(manifest.get("judge_report.json").is_some());

    let judge: serde_json::Value =
        serde_json::from_str(&read(&artifacts.join("judge_report.json"))).unwrap();
    assert_eq!(judge["decision"], "accept");

    let persisted: serde_json::Value =
        serde_json::from_str(&read(&run_dir.join("pipeline_result.json"))).unwrap();
    assert_eq!(persisted["verdict"], "success");
    assert_eq!(persisted["transitions"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_source_archive_is_reproducible_across_runs() {
    let (_dir, config, spec_path) = setup(USER_SPEC, "contacts.yaml");
    let orchestrator = orchestrator(config);
    let first = orchestrator.run(RunRequest::new(&spec_path).with_run_id("a")).await;
    let second = orchestrator.run(RunRequest::new(&spec_path).with_run_id("b")).await;

    let zip_a = fs::read(first.run_dir.unwrap().join("artifacts/source.zip")).unwrap();
    let zip_b = fs::read(second.run_dir.unwrap().join("artifacts/source.zip")).unwrap();
    assert_eq!(zip_a, zip_b);

    let archive = zip::ZipArchive::new(std::io::Cursor::new(zip_a)).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    assert!(names.contains(&"lib/main.dart"));
    assert!(names.iter().all(|n| !n.starts_with("android/")));
}

#[tokio::test]
async fn test_unsupported_version_aborts_without_run_dir() {
    let spec = "meta:\n  schema_version: \"9.9.9\"\napp:\n  name: Future\n";
    let (dir, config, spec_path) = setup(spec, "future.yaml");
    let result = orchestrator(config)
        .run(RunRequest::new(&spec_path).with_run_id("never"))
        .await;

    assert_eq!(result.state, PipelineState::Aborted);
    assert_eq!(result.verdict, Verdict::Aborted);
    assert!(!result.success);
    assert_eq!(result.decision, None);
    assert!(result.run_dir.is_none());
    let validate = result.steps.validate.as_ref().unwrap();
    assert_eq!(validate.error.as_ref().unwrap().kind, "SchemaVersionMismatch");
    assert!(result.steps.critic.is_none());
    assert!(!dir.path().join("work/never").exists());
}

#[tokio::test]
async fn test_schema_violations_are_all_reported() {
    let spec = r##"{
  "meta": {"schema_version": "0.1.0"},
  "app": {"name": "", "theme": {"primary_color": "blue"}}
}"##;
    let (_dir, config, spec_path) = setup(spec, "bad.json");
    let result = orchestrator(config).run(RunRequest::new(&spec_path)).await;

    let error = result.steps.validate.as_ref().unwrap().error.clone().unwrap();
    assert_eq!(error.kind, "ValidationFailed");
    assert!(error.message.contains("/app/name"));
    assert!(error.message.contains("/app/theme/primary_color"));
}

#[tokio::test]
async fn test_missing_sections_lead_to_revise() {
    let spec = "meta:\n  schema_version: \"0.1.0\"\napp:\n  name: Bare\n";
    let (_dir, config, spec_path) = setup(spec, "bare.yaml");
    let result = orchestrator(config).run(RunRequest::new(&spec_path)).await;

    assert_eq!(result.state, PipelineState::Done);
    assert_eq!(result.verdict, Verdict::Revise);
    let critic = result.steps.critic.as_ref().unwrap().output().unwrap();
    assert_eq!(
        critic.blocking,
        vec!["Section 'data' missing", "Section 'ui' missing", "Section 'ci' missing"]
    );
    assert!(result.reason.contains("critic"));

    let sql = read(&result.run_dir.unwrap().join("artifacts/db_schema.sql"));
    assert!(!sql.contains("CREATE TABLE"));
}

#[tokio::test]
async fn test_schema_write_failure_does_not_stop_contract_or_run() {
    let (_dir, config, spec_path) = setup(USER_SPEC, "contacts.yaml");
    let result = Orchestrator::init(config)
        .with_codegen(BlockingCodegen { artifact: "db_schema.sql" })
        .with_builder(FakeBuild)
        .with_verifier(StubVerifier::passing())
        .run(RunRequest::new(&spec_path).with_run_id("no-schema"))
        .await;

    assert_eq!(result.state, PipelineState::Done);
    let schema = result.steps.db_schema.as_ref().unwrap();
    assert_eq!(schema.status, StepStatus::Failed);
    assert_eq!(schema.error.as_ref().unwrap().kind, "PackagingIOError");
    assert_eq!(result.steps.contract.as_ref().unwrap().status, StepStatus::Success);
    assert_eq!(result.steps.package.as_ref().unwrap().status, StepStatus::Success);
    assert!(result.steps.judge.is_some());

    let errors = result.steps.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, PipelineState::DerivingSchema);
    assert!(result.run_dir.unwrap().join("artifacts/openapi.yaml").is_file());
}

#[tokio::test]
async fn test_packaging_failure_still_reaches_judge() {
    let (_dir, config, spec_path) = setup(USER_SPEC, "contacts.yaml");
    let result = Orchestrator::init(config)
        .with_codegen(BlockingCodegen { artifact: "source.zip" })
        .with_builder(FakeBuild)
        .with_verifier(StubVerifier::passing())
        .run(RunRequest::new(&spec_path).with_run_id("no-zip"))
        .await;

    assert_eq!(result.state, PipelineState::Done);
    let package = result.steps.package.as_ref().unwrap();
    assert_eq!(package.status, StepStatus::Failed);
    assert_eq!(package.error.as_ref().unwrap().kind, "PackagingIOError");
    assert!(package.error.as_ref().unwrap().message.contains("source.zip"));
    assert_eq!(result.steps.db_schema.as_ref().unwrap().status, StepStatus::Success);
    assert_eq!(result.decision, Some(Decision::Accept));

    let run_dir = result.run_dir.unwrap();
    assert!(run_dir.join("artifacts/judge_report.json").is_file());
    assert!(run_dir.join("pipeline_result.json").is_file());
}

#[tokio::test]
async fn test_existing_run_id_is_refused() {
    let (dir, config, spec_path) = setup(USER_SPEC, "contacts.yaml");
    fs::create_dir_all(dir.path().join("work/taken")).unwrap();
    let result = orchestrator(config)
        .run(RunRequest::new(&spec_path).with_run_id("taken"))
        .await;

    assert_eq!(result.state, PipelineState::Aborted);
    let validate = result.steps.validate.as_ref().unwrap();
    assert_eq!(validate.error.as_ref().unwrap().kind, "RunIdRejected");
    assert!(!dir.path().join("work/taken/artifacts").exists());
}

//! Artifact bundle assembly.
//!
//! The packager turns a run directory into its final `artifacts/` shape:
//! source archive, spec copy, binary (when one was built), README and the
//! critic/verifier/judge reports, sealed by `checksums.txt`.

pub mod archive;
pub mod manifest;

pub use archive::{SOURCE_ARCHIVE, write_source_zip};
pub use manifest::{ChecksumManifest, MANIFEST_FILE};

use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::adapters::build::locate_binary;
use crate::critic::CriticReport;
use crate::derive::Entity;
use crate::errors::PackagingError;
use crate::judge::JudgeDecision;
use crate::run_id::RunId;
use crate::spec::SpecDocument;
use crate::util::write_json_pretty;
use crate::verify::{StaticCheckReport, TestReport};

pub const README_FILE: &str = "README.md";
pub const CRITIC_REPORT: &str = "critic_report.json";
pub const VERIFIER_REPORT: &str = "verifier_report.json";
pub const JUDGE_REPORT: &str = "judge_report.json";

/// Everything the packager reads.
pub struct PackageContext<'a> {
    pub run_id: &'a RunId,
    pub spec: &'a SpecDocument,
    /// Copy of the input spec inside the run directory
    pub spec_copy: Option<&'a Path>,
    pub entities: &'a [Entity],
    pub critic: &'a CriticReport,
    pub static_checks: &'a StaticCheckReport,
    pub tests: &'a TestReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    pub files: Vec<String>,
    pub source_entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
}

#[derive(Serialize)]
struct PendingJudgeReport<'a> {
    status: &'static str,
    tests: &'a TestReport,
}

/// Assembles `<run>/artifacts/`.
pub struct Packager {
    app_dir: PathBuf,
    artifacts_dir: PathBuf,
}

impl Packager {
    pub fn new(app_dir: impl Into<PathBuf>, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: app_dir.into(),
            artifacts_dir: artifacts_dir.into(),
        }
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn package(&self, ctx: &PackageContext<'_>) -> Result<PackageReport, PackagingError> {
        let dir = &self.artifacts_dir;
        std::fs::create_dir_all(dir).map_err(|e| PackagingError::io(dir, e))?;

        let source_entries = write_source_zip(&self.app_dir, &dir.join(SOURCE_ARCHIVE))?;
        debug!(entries = source_entries, "Wrote source archive");

        if let Some(spec_copy) = ctx.spec_copy {
            if let Some(name) = spec_copy.file_name() {
                let target = dir.join(name);
                std::fs::copy(spec_copy, &target).map_err(|e| PackagingError::io(&target, e))?;
            }
        }

        let binary = self.copy_binary()?;

        let readme = render_readme(ctx, binary.as_deref());
        let readme_path = dir.join(README_FILE);
        std::fs::write(&readme_path, readme).map_err(|e| PackagingError::io(&readme_path, e))?;

        self.write_report(CRITIC_REPORT, ctx.critic)?;
        self.write_report(VERIFIER_REPORT, ctx.static_checks)?;
        self.write_report(
            JUDGE_REPORT,
            &PendingJudgeReport {
                status: "pending",
                tests: ctx.tests,
            },
        )?;

        let manifest = ChecksumManifest::write(dir)?;
        let mut files: Vec<String> = manifest.paths().map(str::to_string).collect();
        files.push(MANIFEST_FILE.to_string());

        Ok(PackageReport {
            files,
            source_entries,
            binary,
        })
    }

    /// Replace the pending judge report with the decision and reseal the manifest.
    pub fn finalize(&self, decision: &JudgeDecision) -> Result<ChecksumManifest, PackagingError> {
        self.write_report(JUDGE_REPORT, decision)?;
        ChecksumManifest::write(&self.artifacts_dir)
    }

    fn write_report<T: Serialize>(&self, name: &str, value: &T) -> Result<(), PackagingError> {
        let path = self.artifacts_dir.join(name);
        write_json_pretty(&path, value).map_err(|e| PackagingError::io(&path, e))
    }

    /// Make sure the built binary, if any, sits in the bundle. Release wins over debug.
    fn copy_binary(&self) -> Result<Option<String>, PackagingError> {
        for name in ["app-release.apk", "app-debug.apk"] {
            if self.artifacts_dir.join(name).is_file() {
                return Ok(Some(name.to_string()));
            }
        }
        let Some((built, variant)) = locate_binary(&self.app_dir) else {
            return Ok(None);
        };
        let name = format!("app-{}.apk", variant);
        let target = self.artifacts_dir.join(&name);
        std::fs::copy(&built, &target).map_err(|e| PackagingError::io(&target, e))?;
        Ok(Some(name))
    }
}

fn render_readme(ctx: &PackageContext<'_>, binary: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", ctx.spec.app_name());
    out.push_str("Mobile application generated by appforge.\n\n");
    out.push_str("## Details\n\n");
    let _ = writeln!(out, "- **Name**: {}", ctx.spec.app_name());
    let _ = writeln!(out, "- **Bundle ID**: {}", ctx.spec.bundle_id());
    let _ = writeln!(out, "- **Run**: {}", ctx.run_id);
    out.push_str("- **Type**: Flutter application\n");

    out.push_str("\n## Entities\n\n");
    if ctx.entities.is_empty() {
        out.push_str("No data entities declared.\n");
    }
    for entity in ctx.entities {
        let _ = writeln!(
            out,
            "- `{}` (table `{}`, {} field(s))",
            entity.name,
            entity.table_name,
            entity.fields.len()
        );
    }

    out.push_str("\n## Installation\n\n");
    match binary {
        Some(name) => {
            let _ = writeln!(
                out,
                "Install `{}` on an Android device (allow installs from unknown sources).\n",
                name
            );
        }
        None => out.push_str("No binary was built for this run; build it from source.\n\n"),
    }
    out.push_str("From source:\n\n1. Extract `source.zip`\n2. Run `flutter pub get`\n3. Run `flutter run`\n\n");
    out.push_str("## Build\n\n```bash\nflutter build apk --release\n```\n\n");
    out.push_str("## Tests\n\n```bash\nflutter test\n```\n\n");
    out.push_str("## Contents\n\n- `openapi.yaml` and `dart_client/`: API contract and client stub\n- `db_schema.sql`: SQLite schema\n- `checksums.txt`: SHA-256 of every file in this bundle\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::Decision;
    use std::fs;
    use tempfile::tempdir;

    struct Fixture {
        run_id: RunId,
        spec: SpecDocument,
        critic: CriticReport,
        static_checks: StaticCheckReport,
        tests: TestReport,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                run_id: RunId::parse("run-42").unwrap(),
                spec: serde_json::from_value(serde_json::json!({
                    "app": {"name": "Notes", "bundle_id_android": "com.example.notes"}
                }))
                .unwrap(),
                critic: CriticReport::default(),
                static_checks: StaticCheckReport {
                    format_ok: true,
                    analyze_ok: true,
                    lint_ok: true,
                    message: "ok".into(),
                },
                tests: TestReport {
                    tests_ok: true,
                    test_count: 0,
                    passed: 0,
                    failed: 0,
                    message: "ok".into(),
                },
            }
        }

        fn context<'a>(&'a self, spec_copy: Option<&'a Path>) -> PackageContext<'a> {
            PackageContext {
                run_id: &self.run_id,
                spec: &self.spec,
                spec_copy,
                entities: &[],
                critic: &self.critic,
                static_checks: &self.static_checks,
                tests: &self.tests,
            }
        }
    }

    fn app_with_debug_apk(run: &Path) -> PathBuf {
        let app = run.join("app");
        let outputs = app.join("build/app/outputs/flutter-apk");
        fs::create_dir_all(app.join("lib")).unwrap();
        fs::create_dir_all(&outputs).unwrap();
        fs::write(app.join("lib/main.dart"), "void main() {}\n").unwrap();
        fs::write(outputs.join("app-debug.apk"), "apk").unwrap();
        app
    }

    #[test]
    fn test_package_writes_bundle() {
        let run = tempdir().unwrap();
        let app = app_with_debug_apk(run.path());
        let spec_copy = run.path().join("spec.yaml");
        fs::write(&spec_copy, "app: {name: Notes}\n").unwrap();

        let fixture = Fixture::new();
        let packager = Packager::new(&app, run.path().join("artifacts"));
        let report = packager.package(&fixture.context(Some(&spec_copy))).unwrap();

        assert_eq!(report.source_entries, 1);
        assert_eq!(report.binary.as_deref(), Some("app-debug.apk"));
        for name in [
            SOURCE_ARCHIVE,
            "spec.yaml",
            "app-debug.apk",
            README_FILE,
            CRITIC_REPORT,
            VERIFIER_REPORT,
            JUDGE_REPORT,
            MANIFEST_FILE,
        ] {
            assert!(packager.artifacts_dir().join(name).is_file(), "{name}");
            assert!(report.files.iter().any(|f| f == name), "{name} not reported");
        }

        let judge: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(packager.artifacts_dir().join(JUDGE_REPORT)).unwrap(),
        )
        .unwrap();
        assert_eq!(judge["status"], "pending");
        assert_eq!(judge["tests"]["tests_ok"], true);

        let readme = fs::read_to_string(packager.artifacts_dir().join(README_FILE)).unwrap();
        assert!(readme.contains("**Bundle ID**: com.example.notes"));
        assert!(readme.contains("**Run**: run-42"));
    }

    #[test]
    fn test_manifest_matches_artifact_set() {
        let run = tempdir().unwrap();
        let fixture = Fixture::new();
        let packager = Packager::new(run.path().join("app"), run.path().join("artifacts"));
        packager.package(&fixture.context(None)).unwrap();

        let manifest = ChecksumManifest::parse(
            &fs::read_to_string(packager.artifacts_dir().join(MANIFEST_FILE)).unwrap(),
        );
        let mut on_disk: Vec<String> = fs::read_dir(packager.artifacts_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n != MANIFEST_FILE)
            .collect();
        on_disk.sort();
        assert_eq!(manifest.paths().collect::<Vec<_>>(), on_disk);
    }

    #[test]
    fn test_finalize_reseals_manifest() {
        let run = tempdir().unwrap();
        let fixture = Fixture::new();
        let packager = Packager::new(run.path().join("app"), run.path().join("artifacts"));
        packager.package(&fixture.context(None)).unwrap();
        let before = ChecksumManifest::compute(packager.artifacts_dir()).unwrap();

        let decision = JudgeDecision {
            decision: Decision::Accept,
            critic_ok: true,
            static_ok: true,
            tests_ok: true,
            reason: "All gates passed".into(),
        };
        let after = packager.finalize(&decision).unwrap();

        assert_ne!(before.get(JUDGE_REPORT), after.get(JUDGE_REPORT));
        assert_eq!(before.get(SOURCE_ARCHIVE), after.get(SOURCE_ARCHIVE));
        let written = fs::read_to_string(packager.artifacts_dir().join(MANIFEST_FILE)).unwrap();
        assert_eq!(ChecksumManifest::parse(&written), after);
        assert_eq!(
            after.get(JUDGE_REPORT).unwrap(),
            crate::util::sha256_file(&packager.artifacts_dir().join(JUDGE_REPORT)).unwrap()
        );
    }

    #[test]
    fn test_packaging_twice_is_idempotent() {
        let run = tempdir().unwrap();
        let app = app_with_debug_apk(run.path());
        let fixture = Fixture::new();
        let packager = Packager::new(&app, run.path().join("artifacts"));
        packager.package(&fixture.context(None)).unwrap();
        let first = fs::read(packager.artifacts_dir().join(MANIFEST_FILE)).unwrap();
        packager.package(&fixture.context(None)).unwrap();
        let second = fs::read(packager.artifacts_dir().join(MANIFEST_FILE)).unwrap();
        assert_eq!(first, second);
    }
}

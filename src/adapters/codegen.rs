//! Client source generation through the scaffolding toolchain.
//!
//! The real adapter renders the `mason` brick with the spec's variables and
//! grafts the Android platform directory produced by `flutter create` onto
//! the result. When the toolchain is unreachable and fallback is allowed, the
//! local scaffold is written instead and the outcome is marked as a fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::{Toolchain, container_name};
use super::process::run_process;
use super::scaffold::{dart_package_name, write_scaffold};
use crate::config::ToolchainMode;
use crate::errors::ToolError;
use crate::spec::SpecDocument;
use crate::util::write_json_pretty;

pub const VARS_FILE: &str = "vars.json";
const SCAFFOLD_TMP: &str = ".flutter_scaffold_tmp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarsEntity {
    pub name: String,
    pub fields: Vec<String>,
}

/// Variables handed to the template brick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodegenVars {
    pub app_name: String,
    pub primary_color: String,
    pub navigation: serde_json::Value,
    pub entities: Vec<VarsEntity>,
}

impl CodegenVars {
    pub fn from_spec(spec: &SpecDocument) -> Self {
        Self {
            app_name: spec.app_name().to_string(),
            primary_color: spec.primary_color().to_string(),
            navigation: spec.navigation(),
            entities: spec
                .entities()
                .iter()
                .map(|e| VarsEntity {
                    name: e.name.clone(),
                    fields: e.fields.iter().map(|f| f.name.clone()).collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodegenRequest {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub app_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub vars: CodegenVars,
}

/// How the client source tree was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodegenMode {
    /// Brick rendered by the external toolchain
    Toolchain,
    /// Local scaffold requested by configuration
    Scaffold,
    /// Local scaffold written because the toolchain was unavailable
    FallbackScaffold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegenOutcome {
    pub app_dir: PathBuf,
    pub mode: CodegenMode,
    pub vars_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

#[async_trait]
pub trait CodegenAdapter: Send + Sync {
    async fn generate(
        &self,
        request: &CodegenRequest,
        cancel: &CancellationToken,
    ) -> Result<CodegenOutcome, ToolError>;
}

/// Writes `vars.json` into the run directory.
pub fn write_vars(run_dir: &Path, vars: &CodegenVars) -> Result<PathBuf, ToolError> {
    let path = run_dir.join(VARS_FILE);
    write_json_pretty(&path, vars).map_err(|e| ToolError::io(&path, e))?;
    Ok(path)
}

/// `mason` + `flutter create` codegen.
pub struct FlutterCodegen {
    toolchain: Toolchain,
}

impl FlutterCodegen {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }

    async fn check_available(&self, request: &CodegenRequest, cancel: &CancellationToken) -> Result<(), ToolError> {
        let program = self.toolchain.entry_program("mason");
        let spec = super::ProcessSpec {
            tool: program.to_string(),
            program: program.to_string(),
            args: vec!["--version".to_string()],
            cwd: None,
            log_path: request.logs_dir.join("codegen.log"),
            tail_bytes: self.toolchain.config().output_tail_bytes,
            cleanup: None,
        };
        let deadline = Instant::now() + std::time::Duration::from_secs(30);
        match run_process(&spec, deadline, cancel).await {
            Ok(_) => Ok(()),
            Err(e @ (ToolError::Cancelled { .. } | ToolError::Unavailable { .. })) => Err(e),
            Err(other) => Err(ToolError::Unavailable {
                tool: program.to_string(),
                source: std::io::Error::other(other.to_string()),
            }),
        }
    }

    fn fallback(&self, request: &CodegenRequest, vars_path: PathBuf, reason: String) -> Result<CodegenOutcome, ToolError> {
        write_scaffold(&request.app_dir, &request.vars)?;
        Ok(CodegenOutcome {
            app_dir: request.app_dir.clone(),
            mode: CodegenMode::FallbackScaffold,
            vars_path,
            fallback_reason: Some(reason),
        })
    }

    async fn run_toolchain(&self, request: &CodegenRequest, cancel: &CancellationToken) -> Result<(), ToolError> {
        let config = self.toolchain.config();
        let deadline = Instant::now() + config.codegen_timeout();
        let log = request.logs_dir.join("codegen.log");
        let run_dir = request.run_dir.as_path();
        let project = dart_package_name(&request.vars.app_name);
        let container = container_name(&request.run_id, "codegen");

        // `mason init` fails when a mason.yaml already exists; that is fine
        let init = self
            .toolchain
            .command("mason", "mason", &["init"], run_dir, &log, &container)?;
        if let Err(e) = run_process(&init, deadline, cancel).await {
            if matches!(e, ToolError::Timeout { .. } | ToolError::Cancelled { .. } | ToolError::Unavailable { .. }) {
                return Err(e);
            }
        }

        let steps: [(&str, Vec<&str>); 3] = [
            (
                "mason",
                vec!["add", config.brick.as_str(), "--path", config.brick_path.as_str()],
            ),
            (
                "mason",
                vec![
                    "make",
                    config.brick.as_str(),
                    "-c",
                    VARS_FILE,
                    "-o",
                    "app",
                    "--on-conflict",
                    "overwrite",
                ],
            ),
            (
                "flutter",
                vec![
                    "create",
                    "-t",
                    "app",
                    "--platforms",
                    "android",
                    "--org",
                    config.org.as_str(),
                    "--project-name",
                    project.as_str(),
                    SCAFFOLD_TMP,
                ],
            ),
        ];
        for (program, args) in &steps {
            let spec = self
                .toolchain
                .command(program, program, args, run_dir, &log, &container)?;
            run_process(&spec, deadline, cancel).await?;
        }

        let tmp = request.run_dir.join(SCAFFOLD_TMP);
        if !tmp.join("android").is_dir() {
            return Err(ToolError::Failed {
                tool: "flutter".to_string(),
                exit_code: Some(0),
                output: "flutter create produced no android/ directory".to_string(),
            });
        }
        copy_tree(&tmp.join("android"), &request.app_dir.join("android"))?;
        let metadata = tmp.join(".metadata");
        if metadata.is_file() {
            std::fs::copy(&metadata, request.app_dir.join(".metadata"))
                .map_err(|e| ToolError::io(&metadata, e))?;
        }
        std::fs::remove_dir_all(&tmp).map_err(|e| ToolError::io(&tmp, e))?;
        Ok(())
    }
}

#[async_trait]
impl CodegenAdapter for FlutterCodegen {
    async fn generate(
        &self,
        request: &CodegenRequest,
        cancel: &CancellationToken,
    ) -> Result<CodegenOutcome, ToolError> {
        std::fs::create_dir_all(&request.app_dir).map_err(|e| ToolError::io(&request.app_dir, e))?;
        let vars_path = write_vars(&request.run_dir, &request.vars)?;

        if self.toolchain.mode() == ToolchainMode::Scaffold {
            write_scaffold(&request.app_dir, &request.vars)?;
            return Ok(CodegenOutcome {
                app_dir: request.app_dir.clone(),
                mode: CodegenMode::Scaffold,
                vars_path,
                fallback_reason: None,
            });
        }

        if let Err(e) = self.check_available(request, cancel).await {
            if matches!(e, ToolError::Unavailable { .. }) && self.toolchain.config().allow_fallback_scaffold {
                warn!(error = %e, "Scaffolding toolchain unavailable, writing local scaffold");
                return self.fallback(request, vars_path, e.to_string());
            }
            return Err(e);
        }

        self.run_toolchain(request, cancel).await?;
        info!(app_dir = %request.app_dir.display(), "Client source generated");
        Ok(CodegenOutcome {
            app_dir: request.app_dir.clone(),
            mode: CodegenMode::Toolchain,
            vars_path,
            fallback_reason: None,
        })
    }
}

/// Recursively copy `from` into `to`, creating directories as needed.
pub(crate) fn copy_tree(from: &Path, to: &Path) -> Result<usize, ToolError> {
    let mut copied = 0;
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| from.to_path_buf());
            ToolError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| ToolError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| ToolError::io(&target, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolchainConfig;
    use tempfile::tempdir;

    fn request(root: &Path) -> CodegenRequest {
        CodegenRequest {
            run_id: "run-1".to_string(),
            run_dir: root.to_path_buf(),
            app_dir: root.join("app"),
            logs_dir: root.join("logs"),
            vars: CodegenVars {
                app_name: "Notes".to_string(),
                primary_color: "#2196F3".to_string(),
                navigation: serde_json::json!("tabs"),
                entities: vec![],
            },
        }
    }

    fn codegen(mode: ToolchainMode, allow_fallback: bool, root: &Path) -> FlutterCodegen {
        let config = ToolchainConfig {
            mode,
            allow_fallback_scaffold: allow_fallback,
            ..Default::default()
        };
        FlutterCodegen::new(Toolchain::new(config, root))
    }

    #[test]
    fn test_vars_from_spec() {
        let spec: SpecDocument = serde_json::from_value(serde_json::json!({
            "app": {"name": "Shop", "theme": {"primary_color": "#000000"}},
            "data": {"entities": [{"name": "Product", "fields": [{"name": "title"}, {"name": "price"}]}]}
        }))
        .unwrap();
        let vars = CodegenVars::from_spec(&spec);
        assert_eq!(vars.app_name, "Shop");
        assert_eq!(vars.primary_color, "#000000");
        assert_eq!(vars.navigation, serde_json::json!("tabs"));
        assert_eq!(vars.entities[0].fields, vec!["title", "price"]);
    }

    #[tokio::test]
    async fn test_scaffold_mode_writes_scaffold() {
        let dir = tempdir().unwrap();
        let req = request(dir.path());
        let outcome = codegen(ToolchainMode::Scaffold, true, dir.path())
            .generate(&req, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.mode, CodegenMode::Scaffold);
        assert!(req.app_dir.join("pubspec.yaml").is_file());
        assert!(dir.path().join(VARS_FILE).is_file());
    }

    #[test]
    fn test_fallback_marks_outcome() {
        let dir = tempdir().unwrap();
        let req = request(dir.path());
        let adapter = codegen(ToolchainMode::Docker, true, dir.path());
        let outcome = adapter
            .fallback(&req, dir.path().join(VARS_FILE), "docker missing".to_string())
            .unwrap();
        assert_eq!(outcome.mode, CodegenMode::FallbackScaffold);
        assert_eq!(outcome.fallback_reason.as_deref(), Some("docker missing"));
        assert!(req.app_dir.join("lib/main.dart").is_file());
    }

    #[test]
    fn test_copy_tree() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("app/src/main")).unwrap();
        std::fs::write(src.join("build.gradle"), "x").unwrap();
        std::fs::write(src.join("app/src/main/AndroidManifest.xml"), "<m/>").unwrap();
        let copied = copy_tree(&src, &dir.path().join("dst")).unwrap();
        assert_eq!(copied, 2);
        assert!(dir.path().join("dst/app/src/main/AndroidManifest.xml").is_file());
    }
}

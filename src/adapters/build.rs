//! Binary build through the containerized Flutter toolchain.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Toolchain, container_name};
use super::process::run_process;
use crate::errors::ToolError;
use crate::spec::BuildVariant;

/// Where `flutter build apk` leaves its outputs, relative to the app dir.
pub const APK_OUTPUT_DIR: &str = "build/app/outputs/flutter-apk";

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub run_id: String,
    pub app_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub variant: BuildVariant,
    /// Wall-clock budget shared by every command of the build
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// Binary copied into the artifact directory
    pub binary: PathBuf,
    pub variant: BuildVariant,
    pub size_bytes: u64,
    pub duration_ms: u64,
}

#[async_trait]
pub trait BuildAdapter: Send + Sync {
    async fn build(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome, ToolError>;
}

/// Check that the client tree can be built at all.
pub fn check_preconditions(app_dir: &Path) -> Result<(), ToolError> {
    if !app_dir.join("pubspec.yaml").is_file() {
        return Err(ToolError::Precondition(format!(
            "{} has no pubspec.yaml",
            app_dir.display()
        )));
    }
    if !app_dir.join("android").is_dir() {
        return Err(ToolError::Precondition(format!(
            "{} has no android/ platform directory",
            app_dir.display()
        )));
    }
    Ok(())
}

/// Locate the built binary; a release build wins over a debug one.
pub fn locate_binary(app_dir: &Path) -> Option<(PathBuf, BuildVariant)> {
    let outputs = app_dir.join(APK_OUTPUT_DIR);
    [BuildVariant::Release, BuildVariant::Debug]
        .into_iter()
        .map(|variant| (outputs.join(format!("app-{}.apk", variant)), variant))
        .find(|(path, _)| path.is_file())
}

/// `flutter pub get` + `flutter build apk`.
pub struct FlutterBuild {
    toolchain: Toolchain,
}

impl FlutterBuild {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }
}

#[async_trait]
impl BuildAdapter for FlutterBuild {
    async fn build(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome, ToolError> {
        check_preconditions(&request.app_dir)?;

        let started = Instant::now();
        let deadline = started + request.timeout;
        let log = request.logs_dir.join("build.log");
        let variant_flag = format!("--{}", request.variant);
        let container = container_name(&request.run_id, "build");

        for args in [vec!["pub", "get"], vec!["build", "apk", variant_flag.as_str()]] {
            let spec = self
                .toolchain
                .command("flutter", "flutter", &args, &request.app_dir, &log, &container)?;
            run_process(&spec, deadline, cancel).await?;
        }

        let (built, variant) =
            locate_binary(&request.app_dir).ok_or_else(|| ToolError::ArtifactNotFound {
                path: request
                    .app_dir
                    .join(APK_OUTPUT_DIR)
                    .join(format!("app-{}.apk", request.variant)),
            })?;

        std::fs::create_dir_all(&request.artifacts_dir)
            .map_err(|e| ToolError::io(&request.artifacts_dir, e))?;
        let file_name = format!("app-{}.apk", variant);
        let target = request.artifacts_dir.join(&file_name);
        let size_bytes = std::fs::copy(&built, &target).map_err(|e| ToolError::io(&target, e))?;

        info!(binary = %target.display(), size_bytes, "Build produced binary");
        Ok(BuildOutcome {
            binary: target,
            variant,
            size_bytes,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

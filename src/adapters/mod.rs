//! Adapters around the external scaffolding and build toolchains.
//!
//! Both adapters are traits so the orchestrator can run against fakes in
//! tests. The real implementations resolve their command lines through a
//! [`Toolchain`], which either runs programs directly or wraps them in
//! `docker compose run`.

pub mod build;
pub mod codegen;
pub mod process;
pub mod scaffold;

pub use build::{BuildAdapter, BuildOutcome, BuildRequest, FlutterBuild};
pub use codegen::{CodegenAdapter, CodegenMode, CodegenOutcome, CodegenRequest, CodegenVars, FlutterCodegen};
pub use process::{ProcessOutput, ProcessSpec, run_process};

use std::path::{Component, Path, PathBuf};

use crate::config::{ToolchainConfig, ToolchainMode};
use crate::errors::ToolError;

/// Docker name of the container a stage of `run_id` runs in.
pub fn container_name(run_id: &str, stage: &str) -> String {
    format!("appforge-{}-{}", run_id, stage)
}

/// Resolves tool invocations for the configured toolchain mode.
#[derive(Debug, Clone)]
pub struct Toolchain {
    config: ToolchainConfig,
    work_dir: PathBuf,
}

impl Toolchain {
    pub fn new(config: ToolchainConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            work_dir: work_dir.into(),
        }
    }

    pub fn mode(&self) -> ToolchainMode {
        self.config.mode
    }

    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }

    /// Program spawned first for any tool; probing it tells whether the toolchain exists.
    pub fn entry_program<'a>(&self, program: &'a str) -> &'a str {
        match self.config.mode {
            ToolchainMode::Docker => "docker",
            _ => program,
        }
    }

    /// Map a host directory under the work dir to the container's view of it.
    pub fn container_dir(&self, host: &Path) -> String {
        match host.strip_prefix(&self.work_dir) {
            Ok(rel) => {
                let mut path = self.config.container_work_dir.trim_end_matches('/').to_string();
                for component in rel.components() {
                    if let Component::Normal(part) = component {
                        path.push('/');
                        path.push_str(&part.to_string_lossy());
                    }
                }
                path
            }
            Err(_) => host.display().to_string(),
        }
    }

    /// Build the command line for `program args...` run in `cwd`.
    ///
    /// Arguments are passed through untouched, so callers use paths relative
    /// to `cwd`; that keeps them valid both on the host and in the container.
    /// In Docker mode the container is named `container` and force-removed
    /// when the process is killed, since killing the compose client alone
    /// leaves it running.
    pub fn command(
        &self,
        tool: &str,
        program: &str,
        args: &[&str],
        cwd: &Path,
        log_path: &Path,
        container: &str,
    ) -> Result<ProcessSpec, ToolError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let mut cleanup = None;
        let (program, args, cwd) = match self.config.mode {
            ToolchainMode::Docker => {
                cleanup = Some(vec![
                    "docker".to_string(),
                    "rm".to_string(),
                    "-f".to_string(),
                    container.to_string(),
                ]);
                let mut wrapped = vec![
                    "compose".to_string(),
                    "-f".to_string(),
                    self.config.compose_file.display().to_string(),
                    "run".to_string(),
                    "--rm".to_string(),
                    "--name".to_string(),
                    container.to_string(),
                    "-w".to_string(),
                    self.container_dir(cwd),
                    self.config.service.clone(),
                    program.to_string(),
                ];
                wrapped.extend(args);
                ("docker".to_string(), wrapped, None)
            }
            ToolchainMode::Local => (program.to_string(), args, Some(cwd.to_path_buf())),
            ToolchainMode::Scaffold => {
                return Err(ToolError::Unavailable {
                    tool: tool.to_string(),
                    source: std::io::Error::other("toolchain mode is 'scaffold'"),
                });
            }
        };

        Ok(ProcessSpec {
            tool: tool.to_string(),
            program,
            args,
            cwd,
            log_path: log_path.to_path_buf(),
            tail_bytes: self.config.output_tail_bytes,
            cleanup,
        })
    }
}

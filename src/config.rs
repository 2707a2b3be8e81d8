//! Layered configuration for appforge.
//!
//! Settings are read from `appforge.toml`, then overridden by environment
//! variables, then by CLI flags (applied by the binary).
//!
//! ```toml
//! [pipeline]
//! work_dir = "work"
//! schema_dir = "schemas"
//! supported_schema_versions = ["0.1.0"]
//! build_binary = false
//!
//! [toolchain]
//! mode = "docker"            # docker | local | scaffold
//! compose_file = "infra/docker-compose.yml"
//! service = "runner_flutter"
//! brick = "mobile_app_base"
//! brick_path = "/workspace/bricks/mobile_app_base"
//! codegen_timeout_secs = 300
//! build_timeout_secs = 600
//! allow_fallback_scaffold = true
//! output_tail_bytes = 65536
//!
//! [contract]
//! title = "Forge API"
//! version = "1.0.0"
//! base_url = "http://localhost:8000"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = "appforge.toml";

/// How the external scaffolding/build toolchain is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainMode {
    /// Commands run inside `docker compose run` (default)
    #[default]
    Docker,
    /// Commands run directly on the host
    Local,
    /// No external tools; codegen writes the local scaffold
    Scaffold,
}

impl std::fmt::Display for ToolchainMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolchainMode::Docker => write!(f, "docker"),
            ToolchainMode::Local => write!(f, "local"),
            ToolchainMode::Scaffold => write!(f, "scaffold"),
        }
    }
}

impl std::str::FromStr for ToolchainMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(ToolchainMode::Docker),
            "local" => Ok(ToolchainMode::Local),
            "scaffold" => Ok(ToolchainMode::Scaffold),
            _ => anyhow::bail!(
                "Invalid toolchain mode '{}'. Valid values: docker, local, scaffold",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root under which every run gets its own `<run_id>/` directory
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Directory holding `mobile-app-<version>.json` schema definitions
    #[serde(default = "default_schema_dir")]
    pub schema_dir: PathBuf,
    #[serde(default = "default_supported_versions")]
    pub supported_schema_versions: Vec<String>,
    /// Whether the Build stage runs by default
    #[serde(default)]
    pub build_binary: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            schema_dir: default_schema_dir(),
            supported_schema_versions: default_supported_versions(),
            build_binary: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default)]
    pub mode: ToolchainMode,
    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_brick")]
    pub brick: String,
    /// Brick location as seen by the toolchain (container path in docker mode)
    #[serde(default = "default_brick_path")]
    pub brick_path: String,
    /// Work dir as mounted inside the container
    #[serde(default = "default_container_work_dir")]
    pub container_work_dir: String,
    #[serde(default = "default_codegen_timeout")]
    pub codegen_timeout_secs: u64,
    #[serde(default = "default_build_timeout")]
    pub build_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub allow_fallback_scaffold: bool,
    /// Size of the in-memory output tail kept per process
    #[serde(default = "default_output_tail")]
    pub output_tail_bytes: usize,
    #[serde(default = "default_org")]
    pub org: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            mode: ToolchainMode::default(),
            compose_file: default_compose_file(),
            service: default_service(),
            brick: default_brick(),
            brick_path: default_brick_path(),
            container_work_dir: default_container_work_dir(),
            codegen_timeout_secs: default_codegen_timeout(),
            build_timeout_secs: default_build_timeout(),
            allow_fallback_scaffold: true,
            output_tail_bytes: default_output_tail(),
            org: default_org(),
        }
    }
}

impl ToolchainConfig {
    pub fn codegen_timeout(&self) -> Duration {
        Duration::from_secs(self.codegen_timeout_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_api_version")]
    pub version: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            version: default_api_version(),
            base_url: default_base_url(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}
fn default_schema_dir() -> PathBuf {
    PathBuf::from("schemas")
}
fn default_supported_versions() -> Vec<String> {
    vec!["0.1.0".to_string()]
}
fn default_compose_file() -> PathBuf {
    PathBuf::from("infra/docker-compose.yml")
}
fn default_service() -> String {
    "runner_flutter".to_string()
}
fn default_brick() -> String {
    "mobile_app_base".to_string()
}
fn default_brick_path() -> String {
    "/workspace/bricks/mobile_app_base".to_string()
}
fn default_container_work_dir() -> String {
    "/work".to_string()
}
fn default_codegen_timeout() -> u64 {
    300
}
fn default_build_timeout() -> u64 {
    600
}
fn default_true() -> bool {
    true
}
fn default_output_tail() -> usize {
    64 * 1024
}
fn default_org() -> String {
    "com.forge".to_string()
}
fn default_title() -> String {
    "Forge API".to_string()
}
fn default_api_version() -> String {
    "1.0.0".to_string()
}
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

/// Top-level configuration, one section per concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppForgeConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub contract: ContractConfig,
}

impl AppForgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// An explicit path must exist. When `path` is `None` the default
    /// `appforge.toml` in the current directory is used if present, otherwise
    /// defaults are returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(CONFIG_FILE_NAME), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppForgeConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary lookup (testable without touching the environment).
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("APPFORGE_WORK_DIR") {
            self.pipeline.work_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("APPFORGE_SCHEMA_DIR") {
            self.pipeline.schema_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("APPFORGE_BUILD_BINARY") {
            self.pipeline.build_binary = matches!(flag.trim(), "1" | "true" | "yes");
        }
        if let Some(mode) = lookup("APPFORGE_TOOLCHAIN") {
            self.toolchain.mode = mode
                .parse()
                .context("Invalid APPFORGE_TOOLCHAIN value")?;
        }
        Ok(())
    }

    /// Path of the schema definition for a version.
    pub fn schema_path(&self, version: &str) -> PathBuf {
        self.pipeline
            .schema_dir
            .join(format!("mobile-app-{}.json", version))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

//! Typed error hierarchy for the appforge pipeline.
//!
//! Three top-level enums cover the three failure domains:
//! - `SpecError`: loading and validating the spec (the only fatal domain)
//! - `ToolError`: external scaffolding/build toolchain invocations
//! - `PackagingError`: artifact bundle I/O
//!
//! Every variant maps to a stable `kind()` string that is recorded in the
//! per-stage result, so callers can match on failures without parsing messages.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from loading or validating a spec document. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("Failed to read spec file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse spec file at {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Spec does not declare meta.schema_version")]
    MissingSchemaVersion,

    #[error("Unsupported schema version '{declared}' (supported: {})", supported.join(", "))]
    SchemaVersionMismatch {
        declared: String,
        supported: Vec<String>,
    },

    #[error("Schema definition for version {version} not found at {path}")]
    SchemaNotFound { version: String, path: PathBuf },

    #[error("Schema definition at {path} is invalid: {message}")]
    SchemaInvalid { path: PathBuf, message: String },

    #[error("Spec failed validation with {} error(s)", errors.len())]
    ValidationFailed { errors: Vec<String> },

    #[error("Invalid run id '{0}': only letters, digits, '_', '-' and '.' are allowed")]
    RunIdInvalid(String),

    #[error("Run id '{0}' is already in use")]
    RunIdInUse(String),

    #[error("Failed to prepare run directory {path}: {source}")]
    RunDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SpecError {
    pub fn kind(&self) -> &'static str {
        match self {
            SpecError::Read { .. } | SpecError::Parse { .. } => "SpecParseError",
            SpecError::MissingSchemaVersion | SpecError::SchemaVersionMismatch { .. } => {
                "SchemaVersionMismatch"
            }
            SpecError::SchemaNotFound { .. } => "SchemaNotFound",
            SpecError::SchemaInvalid { .. } => "SchemaInvalid",
            SpecError::ValidationFailed { .. } => "ValidationFailed",
            SpecError::RunIdInvalid(_) | SpecError::RunIdInUse(_) => "RunIdRejected",
            SpecError::RunDir { .. } => "RunDirError",
        }
    }

    /// Human-readable `path: message` lines for a `ValidationResult`.
    pub fn to_error_lines(&self) -> Vec<String> {
        match self {
            SpecError::ValidationFailed { errors } if !errors.is_empty() => errors.clone(),
            SpecError::MissingSchemaVersion => {
                vec!["meta.schema_version: required property is missing".to_string()]
            }
            SpecError::SchemaVersionMismatch { .. } => {
                vec![format!("meta.schema_version: {}", self)]
            }
            other => vec![format!("$: {}", other)],
        }
    }
}

/// Errors from an external toolchain invocation. Never fatal to the pipeline.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{tool}' is unavailable: {source}")]
    Unavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Tool '{tool}' timed out after {}s and was killed", timeout.as_secs())]
    Timeout {
        tool: String,
        timeout: Duration,
        output: String,
    },

    #[error("Tool '{tool}' failed with exit code {}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".into()))]
    Failed {
        tool: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Artifact not found after successful build: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    #[error("Tool '{tool}' was cancelled")]
    Cancelled { tool: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Unavailable { .. } => "ExternalToolUnavailable",
            ToolError::Timeout { .. } => "ExternalToolTimeout",
            ToolError::Failed { .. } | ToolError::Precondition(_) => "ExternalToolFailed",
            ToolError::ArtifactNotFound { .. } => "ArtifactNotFound",
            ToolError::Cancelled { .. } => "Cancelled",
            ToolError::Io { .. } => "ExternalToolFailed",
        }
    }

    /// Captured process output, if the failure carried any.
    pub fn output(&self) -> Option<&str> {
        match self {
            ToolError::Timeout { output, .. } | ToolError::Failed { output, .. } => {
                Some(output.as_str())
            }
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ToolError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from writing the artifact bundle.
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Packaging I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to serialize {what}: {message}")]
    Serialize { what: String, message: String },
}

impl PackagingError {
    pub fn kind(&self) -> &'static str {
        "PackagingIOError"
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackagingError::Io {
            path: path.into(),
            source,
        }
    }
}

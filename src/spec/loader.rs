//! Loading and schema validation of spec documents.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use jsonschema::Validator;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::SpecDocument;
use crate::config::AppForgeConfig;
use crate::errors::SpecError;

/// Spec serialization format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Yaml,
    Json,
}

impl SpecFormat {
    /// `.yaml`/`.yml` (any case) is YAML, everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => SpecFormat::Yaml,
            _ => SpecFormat::Json,
        }
    }

    /// Extension used when copying the spec into a run directory.
    pub fn extension(&self) -> &'static str {
        match self {
            SpecFormat::Yaml => "yaml",
            SpecFormat::Json => "json",
        }
    }
}

/// Versioned schema definitions, compiled once and shared across runs.
pub struct SchemaRegistry {
    schema_dir: PathBuf,
    supported: Vec<String>,
    cache: Mutex<HashMap<String, Arc<Validator>>>,
}

impl SchemaRegistry {
    pub fn new(schema_dir: impl Into<PathBuf>, supported: Vec<String>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            supported,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AppForgeConfig) -> Self {
        Self::new(
            config.pipeline.schema_dir.clone(),
            config.pipeline.supported_schema_versions.clone(),
        )
    }

    pub fn supported_versions(&self) -> &[String] {
        &self.supported
    }

    pub fn supports(&self, version: &str) -> bool {
        self.supported.iter().any(|v| v == version)
    }

    pub fn schema_path(&self, version: &str) -> PathBuf {
        self.schema_dir.join(format!("mobile-app-{}.json", version))
    }

    /// Compile every supported version up front. Failures are logged and
    /// returned; the affected version is retried lazily on first use.
    pub fn preload(&self) -> Vec<SpecError> {
        let mut failures = Vec::new();
        for version in self.supported.clone() {
            if let Err(e) = self.validator(&version) {
                warn!(version = %version, error = %e, "Schema definition not loaded");
                failures.push(e);
            }
        }
        failures
    }

    /// Compiled validator for a supported version.
    pub fn validator(&self, version: &str) -> Result<Arc<Validator>, SpecError> {
        if !self.supports(version) {
            return Err(SpecError::SchemaVersionMismatch {
                declared: version.to_string(),
                supported: self.supported.clone(),
            });
        }

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(validator) = cache.get(version) {
            return Ok(Arc::clone(validator));
        }

        let path = self.schema_path(version);
        if !path.is_file() {
            return Err(SpecError::SchemaNotFound {
                version: version.to_string(),
                path,
            });
        }
        let content = std::fs::read_to_string(&path).map_err(|e| SpecError::SchemaInvalid {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let schema: Value =
            serde_json::from_str(&content).map_err(|e| SpecError::SchemaInvalid {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| SpecError::SchemaInvalid {
                path: path.clone(),
                message: e.to_string(),
            })?;

        debug!(version = %version, path = %path.display(), "Compiled schema definition");
        let validator = Arc::new(validator);
        cache.insert(version.to_string(), Arc::clone(&validator));
        Ok(validator)
    }
}

/// Outcome of loading and validating a spec.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<SpecDocument>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl ValidationResult {
    pub fn from_result(result: Result<SpecDocument, SpecError>) -> Self {
        match result {
            Ok(spec) => Self {
                valid: true,
                schema_version: spec.schema_version().map(str::to_string),
                spec: Some(spec),
                errors: Vec::new(),
                error_kind: None,
            },
            Err(err) => Self {
                valid: false,
                schema_version: declared_version(&err),
                spec: None,
                errors: err.to_error_lines(),
                error_kind: Some(err.kind().to_string()),
            },
        }
    }
}

fn declared_version(err: &SpecError) -> Option<String> {
    match err {
        SpecError::SchemaVersionMismatch { declared, .. } => Some(declared.clone()),
        SpecError::SchemaNotFound { version, .. } => Some(version.clone()),
        _ => None,
    }
}

/// Parse spec text into a generic tree.
pub fn parse_spec_text(text: &str, format: SpecFormat, path: &Path) -> Result<Value, SpecError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let parsed = match format {
        SpecFormat::Yaml => serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string()),
        SpecFormat::Json => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| SpecError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Load a spec file, validate it against its declared schema version and
/// return the typed document.
pub fn load_spec(path: &Path, registry: &SchemaRegistry) -> Result<SpecDocument, SpecError> {
    let text = std::fs::read_to_string(path).map_err(|source| SpecError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let tree = parse_spec_text(&text, SpecFormat::from_path(path), path)?;
    validate_tree(&tree, registry)
}

/// Validate an already-parsed tree.
pub fn validate_tree(tree: &Value, registry: &SchemaRegistry) -> Result<SpecDocument, SpecError> {
    let version = match tree.pointer("/meta/schema_version") {
        Some(Value::String(v)) if !v.trim().is_empty() => v.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(SpecError::MissingSchemaVersion),
    };

    let validator = registry.validator(&version)?;
    let errors: Vec<String> = validator
        .iter_errors(tree)
        .map(|err| {
            let pointer = err.instance_path().to_string();
            let location = if pointer.is_empty() { "$".to_string() } else { pointer };
            format!("{}: {}", location, err)
        })
        .collect();
    if !errors.is_empty() {
        return Err(SpecError::ValidationFailed { errors });
    }

    serde_json::from_value::<SpecDocument>(tree.clone()).map_err(|e| {
        SpecError::ValidationFailed {
            errors: vec![format!("$: {}", e)],
        }
    })
}

/// Load and validate, folding any failure into a `ValidationResult`.
pub fn validate_spec(path: &Path, registry: &SchemaRegistry) -> ValidationResult {
    ValidationResult::from_result(load_spec(path, registry))
}

//! Built-in tools: spec validation, contract derivation and full pipeline runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;

use super::Tool;
use crate::derive::contract::write_contract_artifacts;
use crate::derive::derive_entities;
use crate::orchestrator::{Orchestrator, RunRequest};
use crate::spec::{load_spec, validate_spec};

fn path_arg(args: &Value, key: &str) -> Result<PathBuf> {
    args.get(key)
        .and_then(Value::as_str)
        .map(PathBuf::from)
        .with_context(|| format!("Missing string argument '{}'", key))
}

pub struct ValidateSpecTool {
    orchestrator: Arc<Orchestrator>,
}

impl ValidateSpecTool {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for ValidateSpecTool {
    fn name(&self) -> &'static str {
        "validate_spec"
    }

    fn description(&self) -> &'static str {
        "Validate a spec document against its declared schema version"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "spec_path": {"type": "string", "minLength": 1}
            },
            "required": ["spec_path"],
            "additionalProperties": false
        })
    }

    async fn run(&self, args: Value) -> Result<Value> {
        let path = path_arg(&args, "spec_path")?;
        let result = validate_spec(&path, self.orchestrator.registry());
        Ok(serde_json::to_value(result)?)
    }
}

pub struct DeriveContractTool {
    orchestrator: Arc<Orchestrator>,
}

impl DeriveContractTool {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for DeriveContractTool {
    fn name(&self) -> &'static str {
        "derive_contract"
    }

    fn description(&self) -> &'static str {
        "Derive the OpenAPI contract and Dart client stub from a spec into an output directory"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "spec_path": {"type": "string", "minLength": 1},
                "output_dir": {"type": "string", "minLength": 1}
            },
            "required": ["spec_path", "output_dir"],
            "additionalProperties": false
        })
    }

    async fn run(&self, args: Value) -> Result<Value> {
        let spec_path = path_arg(&args, "spec_path")?;
        let output_dir = path_arg(&args, "output_dir")?;
        let spec = load_spec(&spec_path, self.orchestrator.registry())
            .with_context(|| format!("Spec {} is not valid", spec_path.display()))?;
        let entities = derive_entities(&spec);
        let report = write_contract_artifacts(&output_dir, &entities, &self.orchestrator.config().contract)
            .context("Failed to write contract artifacts")?;
        Ok(serde_json::to_value(report)?)
    }
}

pub struct RunPipelineTool {
    orchestrator: Arc<Orchestrator>,
}

impl RunPipelineTool {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for RunPipelineTool {
    fn name(&self) -> &'static str {
        "run_pipeline"
    }

    fn description(&self) -> &'static str {
        "Run the full pipeline for a spec and return the pipeline result"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "spec_path": {"type": "string", "minLength": 1},
                "run_id": {"type": "string", "pattern": "^[A-Za-z0-9][A-Za-z0-9_.-]*$"},
                "build_binary": {"type": "boolean"}
            },
            "required": ["spec_path"],
            "additionalProperties": false
        })
    }

    async fn run(&self, args: Value) -> Result<Value> {
        let mut request = RunRequest::new(path_arg(&args, "spec_path")?).with_build_binary(
            args.get("build_binary")
                .and_then(Value::as_bool)
                .unwrap_or(self.orchestrator.config().pipeline.build_binary),
        );
        if let Some(run_id) = args.get("run_id").and_then(Value::as_str) {
            request = request.with_run_id(run_id);
        }
        let result = self.orchestrator.run(request).await;
        Ok(serde_json::to_value(result)?)
    }
}

//! Tool registry
//!
//! Holds the tools registered at startup and dispatches calls by name.

use anyhow::{Result, anyhow, bail};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::Tool;
use super::builtin::{DeriveContractTool, RunPipelineTool, ValidateSpecTool};
use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with the built-in tools, all sharing one orchestrator.
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ValidateSpecTool::new(Arc::clone(&orchestrator))));
        registry.register(Arc::new(DeriveContractTool::new(Arc::clone(&orchestrator))));
        registry.register(Arc::new(RunPipelineTool::new(orchestrator)));
        registry
    }

    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!("Registering tool: {}", tool.name());
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.schema(),
            })
            .collect()
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check `args` against the tool's schema, then run it.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        let tool = self
            .get_tool(name)
            .ok_or_else(|| anyhow!("Unknown tool: {} (available: {})", name, self.tool_names().join(", ")))?;

        let schema = tool.schema();
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| anyhow!("Tool '{}' declares an invalid schema: {}", name, e))?;
        let errors: Vec<String> = validator
            .iter_errors(&args)
            .map(|err| {
                let pointer = err.instance_path().to_string();
                let location = if pointer.is_empty() { "$".to_string() } else { pointer };
                format!("{}: {}", location, err)
            })
            .collect();
        if !errors.is_empty() {
            bail!("Invalid arguments for tool '{}':\n  {}", name, errors.join("\n  "));
        }

        debug!(tool = name, "Calling tool");
        tool.run(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Return the message"
        }

        fn schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"],
                "additionalProperties": false
            })
        }

        async fn run(&self, args: Value) -> Result<Value> {
            Ok(args["message"].clone())
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(EchoTool));
        registry
    }

    #[tokio::test]
    async fn test_call_runs_tool_with_valid_args() {
        let result = registry().call("echo", json!({"message": "hi"})).await.unwrap();
        assert_eq!(result, json!("hi"));
    }

    #[tokio::test]
    async fn test_call_rejects_args_before_running() {
        let err = registry().call("echo", json!({"msg": "hi"})).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Invalid arguments for tool 'echo'"));
        assert!(text.contains("message"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = registry().call("nope", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Unknown tool: nope"));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = registry();
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.definitions()[0].parameters["required"], json!(["message"]));
    }
}

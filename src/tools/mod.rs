//! Named, schema-checked entry points into the pipeline.
//!
//! Every tool declares a JSON schema for its arguments; the registry checks
//! arguments against it before the tool runs.

pub mod builtin;
pub mod registry;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use registry::{ToolDefinition, ToolRegistry};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> Value;
    async fn run(&self, args: Value) -> Result<Value>;
}

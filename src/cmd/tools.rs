//! Tool registry access: `appforge tools list` and `appforge tools call`.

use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;

use super::super::{Cli, ToolsCommands};
use super::{EXIT_ACCEPT, load_config};

pub async fn cmd_tools(cli: &Cli, command: &ToolsCommands) -> Result<u8> {
    use appforge::orchestrator::Orchestrator;
    use appforge::tools::ToolRegistry;

    let config = load_config(cli)?;
    let registry = ToolRegistry::new(Arc::new(Orchestrator::init(config)));

    match command {
        ToolsCommands::List { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
            } else {
                for definition in registry.definitions() {
                    println!("{:<18} {}", style(&definition.name).bold(), definition.description);
                }
            }
        }
        ToolsCommands::Call { name, args } => {
            let args: serde_json::Value =
                serde_json::from_str(args).context("--args is not valid JSON")?;
            let output = registry.call(name, args).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(EXIT_ACCEPT)
}

//! Spec validation without a run: `appforge validate`.

use anyhow::Result;
use console::style;
use std::path::PathBuf;

use super::super::Cli;
use super::{EXIT_ABORT, EXIT_ACCEPT, load_config};

pub fn cmd_validate(cli: &Cli, spec: PathBuf, json: bool) -> Result<u8> {
    use appforge::critic::critique;
    use appforge::spec::{SchemaRegistry, validate_spec};
    use appforge::ui::icons::{CHECK, CROSS, WARN};

    let config = load_config(cli)?;
    let registry = SchemaRegistry::from_config(&config);
    let result = validate_spec(&spec, &registry);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(if result.valid { EXIT_ACCEPT } else { EXIT_ABORT });
    }

    if let Some(document) = result.spec.as_ref().filter(|_| result.valid) {
        println!(
            "{}{} is valid (schema {})",
            CHECK,
            spec.display(),
            result.schema_version.as_deref().unwrap_or("unknown")
        );
        let report = critique(document);
        for issue in &report.issues {
            let blocking = report.blocking.contains(issue);
            let label = if blocking {
                style("blocking").red()
            } else {
                style("warning").yellow()
            };
            println!("  {}{}: {}", WARN, label, issue);
        }
        return Ok(EXIT_ACCEPT);
    }

    println!(
        "{}{} is invalid ({})",
        CROSS,
        spec.display(),
        result.error_kind.as_deref().unwrap_or("ValidationFailed")
    );
    for error in &result.errors {
        println!("  - {}", error);
    }
    Ok(EXIT_ABORT)
}

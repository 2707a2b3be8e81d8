//! Full pipeline run: `appforge run`.

use anyhow::Result;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::super::Cli;
use super::load_config;

pub async fn cmd_run(
    cli: &Cli,
    spec: PathBuf,
    run_id: Option<String>,
    build_binary: bool,
    json: bool,
) -> Result<u8> {
    use appforge::orchestrator::{Orchestrator, RunRequest};
    use appforge::ui::PipelineUI;

    let config = load_config(cli)?;
    let build_binary = build_binary || config.pipeline.build_binary;

    let ui = Arc::new(if json {
        PipelineUI::hidden()
    } else {
        PipelineUI::new(cli.verbose)
    });
    let orchestrator = Orchestrator::init(config).with_observer(ui);

    let mut request = RunRequest::new(spec).with_build_binary(build_binary);
    if let Some(id) = run_id {
        request = request.with_run_id(id);
    }

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };
    let result = orchestrator.run_with_cancel(request, cancel).await;
    interrupt.abort();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for (stage, error) in result.steps.errors() {
            eprintln!(
                "  {} {} {}",
                style(format!("{}:", stage.label())).red(),
                style(&error.kind).bold(),
                error.message
            );
        }
    }

    Ok(result.exit_code())
}

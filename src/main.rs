use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Parser)]
#[command(name = "appforge")]
#[command(version, about = "Turn an application spec into a packaged, judged client build")]
pub struct Cli {
    /// Path to appforge.toml (defaults to ./appforge.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Root directory for run workspaces. Overrides config and APPFORGE_WORK_DIR.
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline for a spec
    Run {
        /// Spec document (.yaml/.yml or .json)
        #[arg(long)]
        spec: PathBuf,

        /// Run id (letters, digits, '_', '-', '.'); generated when omitted
        #[arg(long)]
        run_id: Option<String>,

        /// Build the Android binary
        #[arg(long)]
        build_binary: bool,

        /// Print the pipeline result as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Validate a spec against its schema version
    Validate {
        #[arg(long)]
        spec: PathBuf,

        #[arg(long)]
        json: bool,
    },
    /// List or call registered tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommands,
    },
    /// View configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
pub enum ToolsCommands {
    /// List registered tools
    List {
        #[arg(long)]
        json: bool,
    },
    /// Call a tool with JSON arguments
    Call {
        name: String,

        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold(), e);
            ExitCode::from(cmd::EXIT_ABORT)
        }
    }
}

async fn run(cli: &Cli) -> Result<u8> {
    use appforge::logging::{LoggingConfig, init_logging};

    let _log_guard = init_logging(&LoggingConfig {
        verbose: cli.verbose,
        json: cli.log_format == LogFormat::Json,
        file: cli.log_file.clone(),
    })?;

    match &cli.command {
        Commands::Run {
            spec,
            run_id,
            build_binary,
            json,
        } => cmd::cmd_run(cli, spec.clone(), run_id.clone(), *build_binary, *json).await,
        Commands::Validate { spec, json } => cmd::cmd_validate(cli, spec.clone(), *json),
        Commands::Tools { command } => cmd::cmd_tools(cli, command).await,
        Commands::Config { command } => cmd::cmd_config(cli, command.as_ref()),
    }
}

//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module     | Commands handled         |
//! |------------|--------------------------|
//! | `run`      | `Run`                    |
//! | `validate` | `Validate`               |
//! | `tools`    | `Tools list`, `Tools call` |
//! | `config`   | `Config show`            |
//!
//! Commands return the process exit code: 0 accept, 1 revise, 2 aborted.

pub mod config;
pub mod run;
pub mod tools;
pub mod validate;

pub use config::cmd_config;
pub use run::cmd_run;
pub use tools::cmd_tools;
pub use validate::cmd_validate;

use anyhow::Result;
use appforge::config::AppForgeConfig;

use super::Cli;

pub const EXIT_ACCEPT: u8 = 0;
pub const EXIT_ABORT: u8 = 2;

/// Effective configuration: file, then environment, then global CLI flags.
pub fn load_config(cli: &Cli) -> Result<AppForgeConfig> {
    let mut config = AppForgeConfig::load(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(work_dir) = &cli.work_dir {
        config.pipeline.work_dir = work_dir.clone();
    }
    Ok(config)
}

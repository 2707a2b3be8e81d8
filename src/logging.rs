//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr (stdout is reserved for command output such as `--json`
//! results), optionally mirrored to a file through a non-blocking writer.
//! `RUST_LOG` replaces the default `appforge=<level>` directive when set.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub json: bool,
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn default_directive(&self) -> &'static str {
        if self.verbose { "appforge=debug" } else { "appforge=warn" }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the process so buffered file output gets flushed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let mut guard = None;
    let file_layer = match &config.file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(&dir, name);
            let (writer, worker) = tracing_appender::non_blocking(appender);
            guard = Some(worker);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(config.filter()),
            )
        }
        None => None,
    };

    let console_layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(config.filter())
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(config.filter())
            .boxed()
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(guard)
}

fn split_log_path(path: &Path) -> Result<(PathBuf, String)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Log file path {} has no file name", path.display()))?
        .to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, name))
}

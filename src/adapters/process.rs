//! Scoped external process execution.
//!
//! A child process is spawned in its own process group with `kill_on_drop`.
//! Its stdout and stderr are merged line by line into a per-stage log file and
//! a bounded in-memory tail. The exit status is awaited alongside the output,
//! so a descendant that inherits the pipes cannot hold the stage open. On
//! timeout or cancellation the whole group is killed and the spec's cleanup
//! command (e.g. `docker rm -f`) runs, so no process outlives its stage.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::ToolError;

/// How long output is still collected after the child has exited.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSpec {
    /// Label used in logs and errors (`mason`, `flutter`, ...)
    pub tool: String,
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; `None` inherits the current one
    pub cwd: Option<PathBuf>,
    pub log_path: PathBuf,
    pub tail_bytes: usize,
    /// Program and arguments run after a timeout or cancellation, for work the
    /// child started outside its own process group (a container, say).
    pub cleanup: Option<Vec<String>>,
}

impl ProcessSpec {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a process that exited successfully.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub tail: String,
    pub lines: usize,
    pub duration: Duration,
}

/// Keeps the last `max` bytes of output.
#[derive(Debug)]
pub(crate) struct TailBuffer {
    buf: String,
    max: usize,
}

impl TailBuffer {
    pub(crate) fn new(max: usize) -> Self {
        Self {
            buf: String::new(),
            max,
        }
    }

    pub(crate) fn push_line(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');
        if self.buf.len() > self.max {
            let mut start = self.buf.len() - self.max;
            while !self.buf.is_char_boundary(start) {
                start += 1;
            }
            self.buf.drain(..start);
        }
    }

    pub(crate) fn into_string(self) -> String {
        self.buf
    }
}

/// Where captured lines go: the stage log plus the tail.
struct Capture<'a> {
    tool: &'a str,
    log: File,
    tail: TailBuffer,
    lines: usize,
}

impl Capture<'_> {
    async fn record(&mut self, line: String) {
        debug!(tool = %self.tool, "{}", line);
        self.lines += 1;
        self.tail.push_line(&line);
        let _ = self.log.write_all(format!("{}\n", line).as_bytes()).await;
    }

    async fn note(&mut self, message: &str) {
        let _ = self
            .log
            .write_all(format!("[appforge] {}\n", message).as_bytes())
            .await;
    }
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
}

/// SIGKILL every process in the group led by `pgid`.
#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(pid) = pgid {
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>) {}

/// Run the spec's cleanup command, if any. Failures are logged only.
async fn run_cleanup(spec: &ProcessSpec, capture: &mut Capture<'_>) {
    let Some((program, args)) = spec.cleanup.as_ref().and_then(|c| c.split_first()) else {
        return;
    };
    capture
        .note(&format!("cleanup: {} {}", program, args.join(" ")))
        .await;
    let status = tokio::time::timeout(
        CLEANUP_TIMEOUT,
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status(),
    )
    .await;
    match status {
        Ok(Ok(status)) if status.success() => {}
        Ok(Ok(status)) => warn!(tool = %spec.tool, %status, "Cleanup command failed"),
        Ok(Err(e)) => warn!(tool = %spec.tool, error = %e, "Cleanup command could not start"),
        Err(_) => warn!(tool = %spec.tool, "Cleanup command timed out"),
    }
}

/// Run a process to completion before `deadline`.
///
/// Returns `Ok` only for a zero exit status. A spawn failure maps to
/// `Unavailable`, a non-zero exit to `Failed`, an expired deadline to
/// `Timeout` (after killing the process group) and cancellation to `Cancelled`.
pub async fn run_process(
    spec: &ProcessSpec,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, ToolError> {
    let started = Instant::now();
    let budget = deadline.saturating_duration_since(started);

    if let Some(parent) = spec.log_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::io(parent, e))?;
    }
    let mut log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&spec.log_path)
        .await
        .map_err(|e| ToolError::io(&spec.log_path, e))?;
    log.write_all(format!("$ {}\n", spec.command_line()).as_bytes())
        .await
        .map_err(|e| ToolError::io(&spec.log_path, e))?;

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }

    let mut child = command.spawn().map_err(|source| ToolError::Unavailable {
        tool: spec.tool.clone(),
        source,
    })?;
    let pgid = child.id();
    debug!(tool = %spec.tool, command = %spec.command_line(), pgid = ?pgid, "Spawned process");

    let (tx, mut rx) = mpsc::channel::<String>(256);
    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, tx.clone());
    }
    drop(tx);

    let mut capture = Capture {
        tool: &spec.tool,
        log,
        tail: TailBuffer::new(spec.tail_bytes),
        lines: 0,
    };
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);

    let mut streams_open = true;
    let outcome = loop {
        tokio::select! {
            line = rx.recv(), if streams_open => match line {
                Some(line) => capture.record(line).await,
                None => streams_open = false,
            },
            status = child.wait() => break Outcome::Exited(status),
            _ = &mut sleep => break Outcome::TimedOut,
            _ = cancel.cancelled() => break Outcome::Cancelled,
        }
    };

    // The child is gone; pick up what it wrote, but a descendant still holding
    // the pipes only gets the grace period before its group is killed.
    if matches!(outcome, Outcome::Exited(_)) && streams_open {
        let grace = tokio::time::sleep(OUTPUT_GRACE);
        tokio::pin!(grace);
        loop {
            tokio::select! {
                line = rx.recv() => match line {
                    Some(line) => capture.record(line).await,
                    None => break,
                },
                _ = &mut grace => {
                    debug!(tool = %spec.tool, "Output still open after exit, killing process group");
                    kill_process_group(pgid);
                    break;
                }
            }
        }
    }
    drop(rx);
    let _ = capture.log.flush().await;

    match outcome {
        Outcome::Exited(Ok(status)) if status.success() => Ok(ProcessOutput {
            tail: capture.tail.into_string(),
            lines: capture.lines,
            duration: started.elapsed(),
        }),
        Outcome::Exited(Ok(status)) => Err(ToolError::Failed {
            tool: spec.tool.clone(),
            exit_code: status.code(),
            output: capture.tail.into_string(),
        }),
        Outcome::Exited(Err(e)) => Err(ToolError::io(&spec.log_path, e)),
        Outcome::TimedOut => {
            kill_process_group(pgid);
            let _ = child.kill().await;
            capture
                .note(&format!("killed after {}s", budget.as_secs()))
                .await;
            run_cleanup(spec, &mut capture).await;
            let _ = capture.log.flush().await;
            Err(ToolError::Timeout {
                tool: spec.tool.clone(),
                timeout: budget,
                output: capture.tail.into_string(),
            })
        }
        Outcome::Cancelled => {
            kill_process_group(pgid);
            let _ = child.kill().await;
            capture.note("killed on cancellation").await;
            run_cleanup(spec, &mut capture).await;
            let _ = capture.log.flush().await;
            Err(ToolError::Cancelled {
                tool: spec.tool.clone(),
            })
        }
    }
}

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use crate::orchestrator::{PipelineResult, PipelineState, StageObserver, StepStatus, Verdict};
use crate::ui::icons::{BLOCKER, CHECK, CLOCK, CROSS, FOLDER, PIVOT, SKIP, SPARKLE, WARN};

/// Terminal progress for a pipeline run, rendered with one `indicatif` bar
/// that advances once per stage. Finished stages are printed above the bar.
pub struct PipelineUI {
    bar: ProgressBar,
    verbose: bool,
}

impl PipelineUI {
    pub fn new(verbose: bool) -> Self {
        let bar = ProgressBar::new(PipelineState::STAGES.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} {spinner} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .expect("progress bar template is a valid static string")
                .progress_chars("█▓▒░"),
        );
        bar.set_prefix("Pipeline");
        Self { bar, verbose }
    }

    /// A UI that draws nothing; used for `--json` output.
    pub fn hidden() -> Self {
        let ui = Self::new(false);
        ui.bar.set_draw_target(ProgressDrawTarget::hidden());
        ui
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        if self.bar.is_hidden() {
            return;
        }
        self.bar.println(msg.as_ref());
    }
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis >= 60_000 {
        format!("{}m {}s", millis / 60_000, (millis % 60_000) / 1000)
    } else if millis >= 1000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        format!("{}ms", millis)
    }
}

impl StageObserver for PipelineUI {
    fn stage_started(&self, stage: PipelineState) {
        self.bar.set_message(format!("{}", style(stage.label()).yellow()));
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn stage_finished(&self, stage: PipelineState, status: StepStatus, duration: Duration) {
        let icon = match status {
            StepStatus::Success => CHECK,
            StepStatus::Degraded => WARN,
            StepStatus::Skipped => SKIP,
            StepStatus::Failed => CROSS,
        };
        let status_text = match status {
            StepStatus::Success => style(status.to_string()).green(),
            StepStatus::Degraded => style(status.to_string()).yellow(),
            StepStatus::Skipped => style(status.to_string()).dim(),
            StepStatus::Failed => style(status.to_string()).red(),
        };
        let mut line = format!("  {}{:<20} {}", icon, stage.label(), status_text);
        if self.verbose {
            line.push_str(&format!(" {}", style(format!("({})", format_duration(duration))).dim()));
        }
        self.print_line(line);
        self.bar.inc(1);
    }

    fn run_finished(&self, result: &PipelineResult) {
        self.bar.disable_steady_tick();
        let (icon, headline) = match result.verdict {
            Verdict::Success => (SPARKLE, style("Accepted".to_string()).green().bold()),
            Verdict::DegradedSuccess => (WARN, style("Accepted (fallback scaffold)".to_string()).yellow().bold()),
            Verdict::Revise => (PIVOT, style("Revise".to_string()).yellow().bold()),
            Verdict::Aborted => (BLOCKER, style("Aborted".to_string()).red().bold()),
        };
        self.bar.finish_and_clear();
        if self.bar.is_hidden() {
            return;
        }

        eprintln!();
        eprintln!("{}{} {}", icon, headline, style(&result.reason).dim());
        eprintln!("  Run:  {}", result.run_id);
        if let Some(run_dir) = &result.run_dir {
            eprintln!("  {}{}", FOLDER, run_dir.join("artifacts").display());
        }
        let elapsed = (result.finished_at - result.started_at)
            .to_std()
            .unwrap_or_default();
        eprintln!("  {}{}", CLOCK, format_duration(elapsed));
    }
}

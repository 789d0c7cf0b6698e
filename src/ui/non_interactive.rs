//! Non-interactive UI for CI/headless environments.

use crate::checks::CheckResult;
use crate::shell::is_ci;

use super::{
    check_text, check_visible, format_duration, OutputMode, RunSummary, SpinnerHandle,
    StatusKind, UserInterface,
};

/// UI implementation for non-interactive mode.
///
/// Output is plain text with bracketed statuses so logs stay greppable.
/// Under CI (see [`is_ci`]) diagnostic blocks such as container logs are
/// printed in every mode but silent, since there is no later chance to
/// look at them.
pub struct NonInteractiveUI {
    mode: OutputMode,
    is_ci: bool,
}

impl NonInteractiveUI {
    /// Create a new non-interactive UI.
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            is_ci: is_ci(),
        }
    }

    /// Create with explicit CI flag (for testing).
    pub fn with_ci(mode: OutputMode, is_ci: bool) -> Self {
        Self { mode, is_ci }
    }

    /// Whether [`show_detail`](UserInterface::show_detail) prints anything.
    pub fn shows_detail(&self) -> bool {
        self.mode.shows_command_output() || (self.is_ci && self.mode.shows_status())
    }
}

impl UserInterface for NonInteractiveUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("✓ {}", msg);
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("⚠ {}", msg);
        }
    }

    fn error(&mut self, msg: &str) {
        eprintln!("✗ {}", msg);
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_progress() {
            println!("  {}", message);
        }
        Box::new(NoopSpinner {
            visible: self.mode.shows_progress(),
        })
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            println!("\n{}\n", title);
        }
    }

    fn show_check(&mut self, check: &CheckResult) {
        if !check_visible(self.mode, check) {
            return;
        }
        println!(
            "  {} {} ({})",
            check.outcome.status_kind().bracketed(),
            check_text(check),
            format_duration(check.duration())
        );
    }

    fn show_detail(&mut self, title: &str, text: &str) {
        if !self.shows_detail() {
            return;
        }
        println!("    ┌─ {} ─────────────────", title);
        for line in text.lines() {
            println!("    │ {}", line);
        }
        println!("    └────────────────────────────────────");
    }

    fn show_section(&mut self, title: &str, rows: &[(&str, String)]) {
        if !self.mode.shows_status() {
            return;
        }
        println!("{}", title);
        let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in rows {
            println!("  {:<width$}  {}", key, value, width = width);
        }
        println!();
    }

    fn show_run_summary(&mut self, summary: &RunSummary) {
        if !self.mode.shows_status() {
            return;
        }

        println!();
        println!("  ┌─ Summary ──────────────────────────");
        for failure in &summary.failures {
            println!(
                "  │ {} {:<32} {}",
                StatusKind::Failed.icon(),
                failure.name,
                failure.detail
            );
        }
        if !summary.failures.is_empty() {
            println!("  ├────────────────────────────────────");
        }
        println!(
            "  │ Total: {} · {} passed · {} failed · {} skipped",
            format_duration(summary.total_duration),
            summary.passed,
            summary.failed,
            summary.skipped,
        );
        println!("  └────────────────────────────────────");

        let verdict = summary.verdict();
        match summary.status {
            StatusKind::Failed => eprintln!("  {} {}", StatusKind::Failed.icon(), verdict),
            kind => println!("  {} {}", kind.icon(), verdict),
        }
    }
}

/// Spinner stand-in that prints only the final line.
struct NoopSpinner {
    visible: bool,
}

impl SpinnerHandle for NoopSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        if self.visible {
            println!("  ✓ {}", msg);
        }
    }

    fn finish_error(&mut self, msg: &str) {
        eprintln!("  ✗ {}", msg);
    }

    fn finish_skipped(&mut self, msg: &str) {
        if self.visible {
            println!("  ○ {}", msg);
        }
    }
}

//! User interface components.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for interactive terminal usage
//! - [`NonInteractiveUI`] for CI/headless environments
//! - [`MockUI`] for asserting on output in tests
//!
//! # Example
//!
//! ```
//! use pgcompat::ui::{create_ui, OutputMode};
//!
//! // Use non-interactive mode for testability
//! let mut ui = create_ui(false, OutputMode::Quiet);
//! ui.show_header("Docker compatibility run");
//! ui.success("All checks passed");
//! ```

pub mod icons;
pub mod mock;
pub mod non_interactive;
pub mod output;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use icons::StatusKind;
pub use mock::{MockSpinner, MockUI, SpinnerStatus};
pub use non_interactive::NonInteractiveUI;
pub use output::OutputMode;
pub use spinner::ProgressSpinner;
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, CompatTheme};

use std::time::Duration;

use crate::checks::{CheckOutcome, CheckResult};

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Start a spinner for an operation.
    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Show one finished check.
    fn show_check(&mut self, check: &CheckResult);

    /// Show a block of diagnostic text, such as container logs.
    fn show_detail(&mut self, title: &str, text: &str);

    /// Show a titled block of key/value rows.
    fn show_section(&mut self, title: &str, rows: &[(&str, String)]);

    /// Show the end-of-run summary.
    fn show_run_summary(&mut self, summary: &RunSummary);
}

/// Handle for controlling a spinner.
pub trait SpinnerHandle {
    /// Update the spinner message.
    fn set_message(&mut self, msg: &str);

    /// Mark the operation as successful.
    fn finish_success(&mut self, msg: &str);

    /// Mark the operation as failed.
    fn finish_error(&mut self, msg: &str);

    /// Mark as skipped.
    fn finish_skipped(&mut self, msg: &str);
}

/// A failed check as listed in the summary box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCheck {
    pub name: String,
    pub detail: String,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// What ran, e.g. "Docker container".
    pub title: String,
    /// Overall status of the run.
    pub status: StatusKind,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration: Duration,
    pub failures: Vec<FailedCheck>,
}

impl RunSummary {
    /// Headline shown under the summary box.
    pub fn verdict(&self) -> String {
        match self.status {
            StatusKind::Success => format!("{}: compatible", self.title),
            StatusKind::Failed => format!(
                "{}: {} of {} checks failed",
                self.title,
                self.failed,
                self.passed + self.failed + self.skipped
            ),
            StatusKind::Skipped => format!("{}: nothing was checked", self.title),
        }
    }
}

/// Text of a check line, without icon or styling.
pub(crate) fn check_text(check: &CheckResult) -> String {
    match &check.outcome {
        CheckOutcome::Passed => check.name.clone(),
        CheckOutcome::Failed(detail) => format!("{}: {}", check.name, detail),
        CheckOutcome::Skipped(reason) => format!("{} ({})", check.name, reason),
    }
}

/// Whether a check line is shown in the given mode.
pub(crate) fn check_visible(mode: OutputMode, check: &CheckResult) -> bool {
    if check.outcome.is_failure() {
        mode.shows_status()
    } else {
        mode.shows_progress()
    }
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

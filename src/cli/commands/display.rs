//! Shared rendering of runner progress and reports.

use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::runner::{RunOutcome, RunProgress, RunReport, RunnerKind};
use crate::ui::{FailedCheck, RunSummary, SpinnerHandle, StatusKind, UserInterface};

/// Map a run outcome onto the status vocabulary.
pub fn outcome_status(outcome: RunOutcome) -> StatusKind {
    match outcome {
        RunOutcome::Passed => StatusKind::Success,
        RunOutcome::Failed => StatusKind::Failed,
        RunOutcome::Skipped => StatusKind::Skipped,
    }
}

/// Summary box contents for one report.
pub fn run_summary(report: &RunReport) -> RunSummary {
    RunSummary {
        title: report.kind.to_string(),
        status: outcome_status(report.outcome),
        passed: report.passed(),
        failed: report.failed(),
        skipped: report.skipped(),
        total_duration: Duration::from_millis(report.duration_ms),
        failures: report
            .checks
            .iter()
            .filter(|c| c.outcome.is_failure())
            .map(|c| FailedCheck {
                name: c.name.clone(),
                detail: c.outcome.detail().unwrap_or_default().to_string(),
            })
            .collect(),
    }
}

/// Show the summary of a finished run, plus what its teardown removed.
pub fn show_report(ui: &mut dyn UserInterface, report: &RunReport) {
    if let Some(teardown) = &report.teardown {
        if ui.output_mode().shows_command_output() {
            ui.message(&format!(
                "Removed {} container(s) and {} network(s)",
                teardown.containers_removed.len(),
                teardown.networks_removed.len()
            ));
        }
    }
    ui.show_run_summary(&run_summary(report));
}

/// Write a JSON report if a path was given.
pub fn write_report<T: serde::Serialize + ?Sized>(
    ui: &mut dyn UserInterface,
    path: Option<&Path>,
    report: &T,
) -> Result<()> {
    if let Some(path) = path {
        crate::runner::write_json(report, path)?;
        ui.message(&format!("Report written to {}", path.display()));
    }
    Ok(())
}

/// Renders [`RunProgress`] events.
///
/// An [`RunProgress::Action`] gets a spinner that is settled by the next
/// event: a check settles it with that check's status, a warning marks it
/// failed, anything else marks it done.
#[derive(Default)]
pub struct ProgressPrinter {
    action: Option<(Box<dyn SpinnerHandle>, String)>,
    current: Option<RunnerKind>,
}

impl ProgressPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle an event from a single runner.
    pub fn handle(&mut self, ui: &mut dyn UserInterface, event: RunProgress<'_>) {
        match event {
            RunProgress::Action(text) => {
                self.settle(StatusKind::Success);
                self.action = Some((ui.start_spinner(text), text.to_string()));
            }
            RunProgress::Check(check) => {
                self.settle(check.outcome.status_kind());
                ui.show_check(check);
            }
            RunProgress::Phase(phase) => {
                self.settle(StatusKind::Success);
                tracing::debug!("Run entered {}", phase);
            }
            RunProgress::Note(text) => {
                self.settle(StatusKind::Success);
                ui.message(text);
            }
            RunProgress::Detail { title, text } => {
                self.settle(StatusKind::Success);
                ui.show_detail(title, text);
            }
            RunProgress::Warning(text) => {
                self.settle(StatusKind::Failed);
                ui.warning(text);
            }
        }
    }

    /// Handle an event from one of several runners, heading each runner.
    pub fn handle_for(&mut self, ui: &mut dyn UserInterface, kind: RunnerKind, event: RunProgress<'_>) {
        if self.current != Some(kind) {
            self.settle(StatusKind::Success);
            self.current = Some(kind);
            ui.show_header(&format!("{} compatibility run", kind));
        }
        self.handle(ui, event);
    }

    /// Settle any spinner still running.
    pub fn finish(&mut self) {
        self.settle(StatusKind::Success);
    }

    fn settle(&mut self, status: StatusKind) {
        if let Some((mut spinner, text)) = self.action.take() {
            match status {
                StatusKind::Success => spinner.finish_success(&text),
                StatusKind::Failed => spinner.finish_error(&text),
                StatusKind::Skipped => spinner.finish_skipped(&text),
            }
        }
    }
}

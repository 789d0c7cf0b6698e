//! Interactive terminal UI.

use console::Term;
use std::io::Write;

use crate::checks::CheckResult;

use super::{
    check_text, check_visible, format_duration, CompatTheme, NonInteractiveUI, OutputMode,
    ProgressSpinner, RunSummary, SpinnerHandle, StatusKind, UserInterface,
};

/// Interactive terminal UI implementation.
pub struct TerminalUI {
    term: Term,
    theme: CompatTheme,
    mode: OutputMode,
}

impl TerminalUI {
    /// Create a new terminal UI.
    pub fn new(mode: OutputMode) -> Self {
        Self {
            term: Term::stdout(),
            theme: CompatTheme::detect(),
            mode,
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_error(msg)).ok();
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() {
            Box::new(ProgressSpinner::new(message))
        } else {
            Box::new(ProgressSpinner::hidden())
        }
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn show_check(&mut self, check: &CheckResult) {
        if !check_visible(self.mode, check) {
            return;
        }
        let kind = check.outcome.status_kind();
        let text = check_text(check);
        let text = match kind {
            StatusKind::Failed => self.theme.error.apply_to(text).to_string(),
            StatusKind::Skipped => self.theme.dim.apply_to(text).to_string(),
            StatusKind::Success => text,
        };
        writeln!(
            self.term,
            "  {} {} {}",
            kind.styled(&self.theme),
            text,
            self.theme
                .duration
                .apply_to(format_duration(check.duration()))
        )
        .ok();
    }

    fn show_detail(&mut self, title: &str, text: &str) {
        if !self.mode.shows_command_output() {
            return;
        }
        let b = &self.theme.border;
        writeln!(
            self.term,
            "    {} {}",
            b.apply_to("┌─"),
            b.apply_to(format!("{} ─────────────────", title))
        )
        .ok();
        for line in text.lines() {
            writeln!(self.term, "    {} {}", b.apply_to("│"), line).ok();
        }
        writeln!(
            self.term,
            "    {}",
            b.apply_to("└────────────────────────────────────")
        )
        .ok();
    }

    fn show_section(&mut self, title: &str, rows: &[(&str, String)]) {
        if !self.mode.shows_status() {
            return;
        }
        writeln!(self.term, "{}", self.theme.header.apply_to(title)).ok();
        let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in rows {
            writeln!(
                self.term,
                "  {:<width$}  {}",
                self.theme.key.apply_to(key),
                value,
                width = width
            )
            .ok();
        }
        writeln!(self.term).ok();
    }

    fn show_run_summary(&mut self, summary: &RunSummary) {
        if !self.mode.shows_status() {
            return;
        }

        let b = &self.theme.border;

        writeln!(self.term).ok();
        writeln!(
            self.term,
            "  {} {}",
            b.apply_to("┌─"),
            b.apply_to("Summary ──────────────────────────")
        )
        .ok();

        for failure in &summary.failures {
            writeln!(
                self.term,
                "  {} {} {:<32} {}",
                b.apply_to("│"),
                StatusKind::Failed.styled(&self.theme),
                failure.name,
                self.theme.dim.apply_to(&failure.detail),
            )
            .ok();
        }
        if !summary.failures.is_empty() {
            writeln!(
                self.term,
                "  {}",
                b.apply_to("├────────────────────────────────────")
            )
            .ok();
        }

        writeln!(
            self.term,
            "  {} Total: {} {} {} passed {} {} failed {} {} skipped",
            b.apply_to("│"),
            self.theme
                .duration
                .apply_to(format_duration(summary.total_duration)),
            self.theme.dim.apply_to("·"),
            summary.passed,
            self.theme.dim.apply_to("·"),
            summary.failed,
            self.theme.dim.apply_to("·"),
            summary.skipped,
        )
        .ok();
        writeln!(
            self.term,
            "  {}",
            b.apply_to("└────────────────────────────────────")
        )
        .ok();

        let verdict = summary.verdict();
        let line = match summary.status {
            StatusKind::Success => self.theme.format_success(&verdict),
            StatusKind::Failed => self.theme.format_error(&verdict),
            StatusKind::Skipped => self.theme.format_skipped(&verdict),
        };
        writeln!(self.term, "  {}", line).ok();
    }
}

/// Create the appropriate UI based on context.
pub fn create_ui(interactive: bool, mode: OutputMode) -> Box<dyn UserInterface> {
    if interactive && Term::stdout().is_term() {
        Box::new(TerminalUI::new(mode))
    } else {
        Box::new(NonInteractiveUI::new(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_ui_without_tty_is_non_interactive() {
        let ui = create_ui(false, OutputMode::Quiet);
        assert_eq!(ui.output_mode(), OutputMode::Quiet);
    }

    #[test]
    fn terminal_ui_keeps_mode() {
        let ui = TerminalUI::new(OutputMode::Verbose);
        assert_eq!(ui.output_mode(), OutputMode::Verbose);
    }
}

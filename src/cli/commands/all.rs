//! The `run-all-tests` command.

use std::time::Duration;

use crate::cli::args::AllArgs;
use crate::config::Expectations;
use crate::error::Result;
use crate::runner::{
    detect_environments, run_all, AmiRunOptions, AmiRunner, DockerRunOptions, DockerRunner,
    Runner, RunnerKind,
};
use crate::ui::{RunSummary, UserInterface};

use super::dispatcher::{Command, CommandResult, RunContext};
use super::display::{outcome_status, show_report, write_report, ProgressPrinter};

/// Runs every runner whose environment is present on this host.
pub struct AllCommand<'a> {
    ctx: &'a RunContext<'a>,
    args: AllArgs,
}

impl<'a> AllCommand<'a> {
    pub fn new(ctx: &'a RunContext<'a>, args: AllArgs) -> Self {
        Self { ctx, args }
    }

    fn runner_for<'r>(&'r self, kind: RunnerKind, expectations: &'r Expectations) -> Box<dyn Runner + 'r> {
        let ctx = self.ctx;
        match kind {
            RunnerKind::Docker => Box::new(
                DockerRunner::new(
                    ctx.commands,
                    ctx.db,
                    &ctx.settings,
                    expectations,
                    DockerRunOptions {
                        stack: self.args.stack,
                        skip_pull: self.args.skip_pull,
                        ..DockerRunOptions::default()
                    },
                )
                .with_temp_root(ctx.temp_root()),
            ),
            RunnerKind::Ami => Box::new(
                AmiRunner::new(
                    ctx.commands,
                    ctx.db,
                    &ctx.settings,
                    expectations,
                    AmiRunOptions {
                        skip_system: self.args.skip_system,
                        skip_services: self.args.skip_services,
                        ..AmiRunOptions::default()
                    },
                )
                .with_temp_root(ctx.temp_root()),
            ),
        }
    }
}

impl Command for AllCommand<'_> {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let expectations = self.ctx.expectations()?;
        let kinds = detect_environments(self.ctx.commands);

        if kinds.is_empty() {
            let msg = "No Docker daemon or local PostgreSQL service detected";
            if self.args.require_environment {
                ui.error(msg);
            } else {
                ui.warning(&format!("{}; nothing to check", msg));
            }
        }

        let runners = kinds
            .into_iter()
            .map(|kind| self.runner_for(kind, &expectations))
            .collect();

        let mut printer = ProgressPrinter::new();
        let result = run_all(runners, &mut |kind, event| printer.handle_for(ui, kind, event));
        printer.finish();

        for report in &result.reports {
            show_report(ui, report);
        }
        for error in &result.errors {
            ui.error(&format!("{} run could not start: {}", error.kind, error.message));
        }
        if result.reports.len() + result.errors.len() > 1 {
            let total_ms: u64 = result.reports.iter().map(|r| r.duration_ms).sum();
            ui.show_run_summary(&RunSummary {
                title: "All runs".to_string(),
                status: outcome_status(result.outcome),
                passed: result.reports.iter().map(|r| r.passed()).sum(),
                failed: result.reports.iter().map(|r| r.failed()).sum(),
                skipped: result.reports.iter().map(|r| r.skipped()).sum(),
                total_duration: Duration::from_millis(total_ms),
                failures: Vec::new(),
            });
        }

        write_report(ui, self.args.report.as_deref(), &result)?;

        match result.exit_code(self.args.require_environment) {
            0 => Ok(CommandResult::success()),
            code => Ok(CommandResult::failure(code)),
        }
    }
}

//! The `run-ami-tests` command.

use crate::cli::args::AmiArgs;
use crate::error::Result;
use crate::runner::{AmiRunOptions, AmiRunner, Runner};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, RunContext};
use super::display::{show_report, write_report, ProgressPrinter};

/// Checks the database service installed on this host.
pub struct AmiCommand<'a> {
    ctx: &'a RunContext<'a>,
    args: AmiArgs,
}

impl<'a> AmiCommand<'a> {
    pub fn new(ctx: &'a RunContext<'a>, args: AmiArgs) -> Self {
        Self { ctx, args }
    }

    fn options(&self) -> AmiRunOptions {
        AmiRunOptions {
            skip_system: self.args.skip_system,
            skip_services: self.args.skip_services,
            ..AmiRunOptions::default()
        }
    }
}

impl Command for AmiCommand<'_> {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let expectations = self.ctx.expectations()?;
        let mut runner = AmiRunner::new(
            self.ctx.commands,
            self.ctx.db,
            &self.ctx.settings,
            &expectations,
            self.options(),
        )
        .with_temp_root(self.ctx.temp_root());

        ui.show_header("AMI host compatibility run");
        let mut printer = ProgressPrinter::new();
        let report = runner.run(&mut |event| printer.handle(ui, event));
        printer.finish();
        let report = report?;

        show_report(ui, &report);
        write_report(ui, self.args.report.as_deref(), &report)?;
        Ok(CommandResult::from_outcome(report.outcome))
    }
}

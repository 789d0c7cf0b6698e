//! The `cleanup-tests` command.

use crate::cli::args::CleanupArgs;
use crate::error::Result;
use crate::runner::{cleanup, CleanupOptions};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, RunContext};

/// Removes everything earlier runs left behind. Always succeeds.
pub struct CleanupCommand<'a> {
    ctx: &'a RunContext<'a>,
    args: CleanupArgs,
}

impl<'a> CleanupCommand<'a> {
    pub fn new(ctx: &'a RunContext<'a>, args: CleanupArgs) -> Self {
        Self { ctx, args }
    }
}

impl Command for CleanupCommand<'_> {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let options = CleanupOptions {
            dry_run: self.args.dry_run,
            temp_root: self.ctx.temp_root(),
        };
        let summary = cleanup(self.ctx.commands, &options);

        if let Some(reason) = &summary.docker_skipped {
            ui.message(&format!("Skipping container cleanup: {}", reason));
        }

        let verb = if summary.dry_run { "Would remove" } else { "Removed" };
        for name in &summary.containers {
            ui.message(&format!("{} container {}", verb, name));
        }
        for name in &summary.networks {
            ui.message(&format!("{} network {}", verb, name));
        }
        for dir in &summary.directories {
            ui.message(&format!("{} directory {}", verb, dir.display()));
        }
        for error in &summary.errors {
            ui.warning(error);
        }

        match (summary.total(), summary.dry_run) {
            (0, _) => ui.success("Nothing to clean up"),
            (n, true) => ui.success(&format!("{} resource(s) would be removed", n)),
            (n, false) => ui.success(&format!("Removed {} resource(s)", n)),
        }
        Ok(CommandResult::success())
    }
}

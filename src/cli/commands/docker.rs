//! The `run-docker-tests` command.

use std::time::Duration;

use crate::cli::args::DockerArgs;
use crate::database::RetryPolicy;
use crate::error::{CompatError, Result};
use crate::runner::{DockerRunOptions, DockerRunner, Runner};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, RunContext};
use super::display::{show_report, write_report, ProgressPrinter};

/// Checks a throwaway PostgreSQL container.
pub struct DockerCommand<'a> {
    ctx: &'a RunContext<'a>,
    args: DockerArgs,
}

impl<'a> DockerCommand<'a> {
    pub fn new(ctx: &'a RunContext<'a>, args: DockerArgs) -> Self {
        Self { ctx, args }
    }

    fn options(&self) -> DockerRunOptions {
        DockerRunOptions {
            stack: self.args.stack,
            skip_pull: self.args.skip_pull,
            readiness: RetryPolicy::default().with_timeout(Duration::from_secs(self.args.timeout)),
            ..DockerRunOptions::default()
        }
    }
}

impl Command for DockerCommand<'_> {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let expectations = self.ctx.expectations()?;
        let mut runner = DockerRunner::new(
            self.ctx.commands,
            self.ctx.db,
            &self.ctx.settings,
            &expectations,
            self.options(),
        )
        .with_temp_root(self.ctx.temp_root());
        tracing::debug!("Docker run id {}", runner.run_id().as_str());

        ui.show_header("Docker container compatibility run");
        let mut printer = ProgressPrinter::new();
        let report = runner.run(&mut |event| printer.handle(ui, event));
        printer.finish();

        let report = match report {
            Ok(report) => report,
            Err(e @ CompatError::RuntimeUnavailable { .. }) => {
                ui.error(&e.to_string());
                return Ok(CommandResult::failure(1));
            }
            Err(e) => return Err(e),
        };

        show_report(ui, &report);
        write_report(ui, self.args.report.as_deref(), &report)?;
        Ok(CommandResult::from_outcome(report.outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MockDatabase;
    use crate::shell::{CommandResult as ShellResult, MockRunner};
    use crate::ui::MockUI;

    fn args() -> DockerArgs {
        DockerArgs {
            stack: false,
            skip_pull: false,
            timeout: 1,
            report: None,
        }
    }

    #[test]
    fn stopped_daemon_exits_one_without_workdir() {
        let runner = MockRunner::new();
        runner.respond_ok("docker --version", "Docker version 27.1.1\n");
        runner.respond(
            "docker info --format {{.ServerVersion}}",
            ShellResult::failure(Some(1), "Cannot connect to the Docker daemon"),
        );
        let db = MockDatabase::new();
        let temp = tempfile::tempdir().unwrap();
        let ctx = RunContext {
            commands: &runner,
            db: &db,
            settings: Default::default(),
            expectations_path: None,
            temp_root: Some(temp.path().to_path_buf()),
        };
        let mut ui = MockUI::new();

        let result = DockerCommand::new(&ctx, args()).execute(&mut ui).unwrap();

        assert_eq!(result.exit_code, 1);
        assert_eq!(ui.errors().len(), 1);
        assert!(ui.summaries().is_empty());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
        assert!(!runner.was_called_with_prefix("docker pull"));
    }

    #[test]
    fn timeout_flag_sets_readiness_budget() {
        let runner = MockRunner::new();
        let db = MockDatabase::new();
        let ctx = RunContext {
            commands: &runner,
            db: &db,
            settings: Default::default(),
            expectations_path: None,
            temp_root: None,
        };
        let command = DockerCommand::new(
            &ctx,
            DockerArgs {
                timeout: 90,
                stack: true,
                ..args()
            },
        );
        let options = command.options();
        assert_eq!(options.readiness.timeout, Duration::from_secs(90));
        assert!(options.stack);
    }
}

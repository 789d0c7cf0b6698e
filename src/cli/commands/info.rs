//! The `show-system-info` command.

use crate::cli::args::InfoArgs;
use crate::error::{CompatError, Result};
use crate::probe::{OsRelease, SystemReport};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, RunContext};

/// Prints what this host looks like. Always succeeds.
pub struct InfoCommand<'a> {
    ctx: &'a RunContext<'a>,
    args: InfoArgs,
}

impl<'a> InfoCommand<'a> {
    pub fn new(ctx: &'a RunContext<'a>, args: InfoArgs) -> Self {
        Self { ctx, args }
    }

    fn render(&self, ui: &mut dyn UserInterface, report: &SystemReport) -> Result<()> {
        if self.args.json {
            let json = serde_json::to_string_pretty(report)
                .map_err(|e| CompatError::Other(e.into()))?;
            ui.message(&json);
            return Ok(());
        }

        ui.show_header("System information");
        for section in report.sections() {
            ui.show_section(section.title, &section.rows);
        }
        Ok(())
    }
}

impl Command for InfoCommand<'_> {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let release = OsRelease::read();
        let report = SystemReport::collect(self.ctx.commands, release.as_ref());
        self.render(ui, &report)?;
        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MockDatabase;
    use crate::probe::NOT_INSTALLED;
    use crate::shell::MockRunner;
    use crate::ui::MockUI;

    fn execute(json: bool) -> MockUI {
        let runner = MockRunner::new();
        let db = MockDatabase::new();
        let ctx = RunContext {
            commands: &runner,
            db: &db,
            settings: Default::default(),
            expectations_path: None,
            temp_root: None,
        };
        let mut ui = MockUI::new();
        let result = InfoCommand::new(&ctx, InfoArgs { json })
            .execute(&mut ui)
            .unwrap();
        assert!(result.success);
        ui
    }

    #[test]
    fn bare_host_reports_docker_not_installed() {
        let ui = execute(false);
        let database = ui
            .sections()
            .iter()
            .find(|(title, _)| title == "Database")
            .unwrap();
        let docker = database.1.iter().find(|(k, _)| k == "Docker").unwrap();
        assert_eq!(docker.1, NOT_INSTALLED);
    }

    #[test]
    fn json_output_is_one_document() {
        let ui = execute(true);
        assert_eq!(ui.messages().len(), 1);
        let json: serde_json::Value = serde_json::from_str(&ui.messages()[0]).unwrap();
        assert_eq!(json["docker"], NOT_INSTALLED);
        assert!(ui.sections().is_empty());
    }
}

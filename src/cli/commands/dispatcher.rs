//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`RunContext`] for the collaborators every command shares
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::PathBuf;

use crate::cli::args::{Cli, Commands};
use crate::config::{Expectations, Settings};
use crate::database::{Database, PgDatabase};
use crate::error::Result;
use crate::runner::RunOutcome;
use crate::shell::{CommandRunner, SystemRunner};
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `ui` - User interface for displaying output
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }

    /// Result for a single runner's outcome; a run that checked nothing passes.
    pub fn from_outcome(outcome: RunOutcome) -> Self {
        if outcome.is_failure() {
            Self::failure(1)
        } else {
            Self::success()
        }
    }
}

/// Collaborators and configuration shared by every command.
pub struct RunContext<'a> {
    pub commands: &'a dyn CommandRunner,
    pub db: &'a dyn Database,
    pub settings: Settings,
    pub expectations_path: Option<PathBuf>,
    /// Where working directories live; the system temp dir when unset.
    pub temp_root: Option<PathBuf>,
}

impl RunContext<'_> {
    /// Load the expectations file, or the built-in defaults.
    pub fn expectations(&self) -> Result<Expectations> {
        Expectations::load_or_default(self.expectations_path.as_deref())
    }

    /// Directory searched and used for working directories.
    pub fn temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    commands: Box<dyn CommandRunner>,
    db: Box<dyn Database>,
    temp_root: Option<PathBuf>,
}

impl CommandDispatcher {
    /// Create a dispatcher over the given collaborators.
    pub fn new(commands: Box<dyn CommandRunner>, db: Box<dyn Database>) -> Self {
        Self {
            commands,
            db,
            temp_root: None,
        }
    }

    /// Dispatcher that runs real commands and talks to a real server.
    ///
    /// Commands run under the C locale so their output parses the same on
    /// every host.
    pub fn system() -> Self {
        let commands = SystemRunner::new().with_env("LC_ALL", "C");
        Self::new(Box::new(commands), Box::new(PgDatabase::new()))
    }

    /// Keep working directories under `root`.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Dispatch and execute a command.
    ///
    /// Routes the CLI subcommand to the appropriate command implementation
    /// and executes it.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let ctx = RunContext {
            commands: self.commands.as_ref(),
            db: self.db.as_ref(),
            settings: cli.connection.settings(),
            expectations_path: cli.expectations.clone(),
            temp_root: self.temp_root.clone(),
        };

        match &cli.command {
            Commands::RunAmiTests(args) => {
                super::ami::AmiCommand::new(&ctx, args.clone()).execute(ui)
            }
            Commands::RunDockerTests(args) => {
                super::docker::DockerCommand::new(&ctx, args.clone()).execute(ui)
            }
            Commands::RunAllTests(args) => {
                super::all::AllCommand::new(&ctx, args.clone()).execute(ui)
            }
            Commands::CleanupTests(args) => {
                super::cleanup::CleanupCommand::new(&ctx, args.clone()).execute(ui)
            }
            Commands::ShowSystemInfo(args) => {
                super::info::InfoCommand::new(&ctx, args.clone()).execute(ui)
            }
            Commands::Completions(args) => {
                super::completions::CompletionsCommand::new(args.clone()).execute(ui)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MockDatabase;
    use crate::shell::MockRunner;
    use crate::ui::MockUI;
    use clap::Parser;

    fn dispatcher(temp: &std::path::Path) -> CommandDispatcher {
        CommandDispatcher::new(Box::new(MockRunner::new()), Box::new(MockDatabase::unreachable()))
            .with_temp_root(temp)
    }

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(1);
        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn skipped_outcome_is_success() {
        assert!(CommandResult::from_outcome(RunOutcome::Skipped).success);
        assert_eq!(CommandResult::from_outcome(RunOutcome::Failed).exit_code, 1);
    }

    #[test]
    fn dispatches_docker_without_runtime_to_failure() {
        let temp = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from(["pgcompat", "run-docker-tests"]);
        let mut ui = MockUI::new();

        let result = dispatcher(temp.path()).dispatch(&cli, &mut ui).unwrap();

        assert_eq!(result.exit_code, 1);
        assert!(ui.has_error("not installed"));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn dispatches_cleanup_to_success() {
        let temp = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from(["pgcompat", "cleanup-tests"]);
        let mut ui = MockUI::new();

        let result = dispatcher(temp.path()).dispatch(&cli, &mut ui).unwrap();
        assert!(result.success);
    }

    #[test]
    fn missing_expectations_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("nope.yml");
        let cli = Cli::parse_from([
            "pgcompat",
            "run-ami-tests",
            "--expectations",
            missing.to_str().unwrap(),
        ]);
        let mut ui = MockUI::new();

        let err = dispatcher(temp.path()).dispatch(&cli, &mut ui).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}

//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::settings::DEFAULT_POSTGRES_IMAGE;
use crate::config::Settings;

/// pgcompat - PostgreSQL compatibility checks for Supabase on Ubuntu 24.04.
#[derive(Debug, Parser)]
#[command(name = "pgcompat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// YAML file overriding the expected versions, extensions and services
    #[arg(long, global = true, value_name = "FILE")]
    pub expectations: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// How to reach the database under test.
#[derive(Debug, Clone, clap::Args)]
pub struct ConnectionArgs {
    /// Database host for runs against this host
    #[arg(long, global = true, env = "POSTGRES_HOST", default_value = "localhost")]
    pub host: String,

    /// Database port for runs against this host
    #[arg(long, global = true, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub port: u16,

    /// Database user
    #[arg(long, global = true, env = "POSTGRES_USER", default_value = "postgres")]
    pub user: String,

    /// Database password
    #[arg(
        long,
        global = true,
        env = "POSTGRES_PASSWORD",
        default_value = "postgres",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub password: String,

    /// Database name
    #[arg(long, global = true, env = "POSTGRES_DB", default_value = "postgres")]
    pub database: String,

    /// PostgreSQL image for container runs
    #[arg(
        long,
        global = true,
        env = "PGCOMPAT_POSTGRES_IMAGE",
        default_value = DEFAULT_POSTGRES_IMAGE,
        value_name = "IMAGE"
    )]
    pub postgres_image: String,
}

impl ConnectionArgs {
    /// Fold the flags into the settings handed to runners.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default()
            .with_host(&self.host)
            .with_password(&self.password);
        settings.port = self.port;
        settings.user = self.user.clone();
        settings.database = self.database.clone();
        settings.images.postgres = self.postgres_image.clone();
        settings
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check the PostgreSQL service installed on this host
    RunAmiTests(AmiArgs),

    /// Check a freshly started PostgreSQL container
    RunDockerTests(DockerArgs),

    /// Run every runner whose environment is present
    RunAllTests(AllArgs),

    /// Remove containers, networks and directories left by earlier runs
    CleanupTests(CleanupArgs),

    /// Print a diagnostic report about this host
    ShowSystemInfo(InfoArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `run-ami-tests` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct AmiArgs {
    /// Skip OS and library version checks
    #[arg(long)]
    pub skip_system: bool,

    /// Skip systemd service checks
    #[arg(long)]
    pub skip_services: bool,

    /// Write a JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// Arguments for the `run-docker-tests` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct DockerArgs {
    /// Also start pgBouncer and PostgREST next to PostgreSQL
    #[arg(long)]
    pub stack: bool,

    /// Use locally cached images instead of pulling
    #[arg(long)]
    pub skip_pull: bool,

    /// Seconds to wait for PostgreSQL to accept connections
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub timeout: u64,

    /// Write a JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// Arguments for the `run-all-tests` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct AllArgs {
    /// Fail when no environment is detected
    #[arg(long)]
    pub require_environment: bool,

    /// Also start pgBouncer and PostgREST in the container run
    #[arg(long)]
    pub stack: bool,

    /// Use locally cached images instead of pulling
    #[arg(long)]
    pub skip_pull: bool,

    /// Skip OS and library version checks
    #[arg(long)]
    pub skip_system: bool,

    /// Skip systemd service checks
    #[arg(long)]
    pub skip_services: bool,

    /// Write a combined JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// Arguments for the `cleanup-tests` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CleanupArgs {
    /// List what would be removed without removing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `show-system-info` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommands_use_kebab_case_names() {
        let cmd = Cli::command();
        let names: Vec<&str> = cmd.get_subcommands().map(|c| c.get_name()).collect();
        assert_eq!(
            names,
            vec![
                "run-ami-tests",
                "run-docker-tests",
                "run-all-tests",
                "cleanup-tests",
                "show-system-info",
                "completions"
            ]
        );
    }

    #[test]
    fn connection_flags_fold_into_settings() {
        let cli = Cli::parse_from([
            "pgcompat",
            "run-ami-tests",
            "--host",
            "10.0.0.5",
            "--port",
            "6432",
            "--password",
            "secret",
            "--skip-services",
        ]);
        let settings = cli.connection.settings();
        assert_eq!(settings.host, "10.0.0.5");
        assert_eq!(settings.port, 6432);
        assert_eq!(settings.password, "secret");
        assert!(matches!(
            cli.command,
            Commands::RunAmiTests(AmiArgs { skip_services: true, .. })
        ));
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::parse_from(["pgcompat", "cleanup-tests", "--dry-run", "--quiet"]);
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Commands::CleanupTests(CleanupArgs { dry_run: true })
        ));
    }

    #[test]
    fn docker_defaults() {
        let cli = Cli::parse_from(["pgcompat", "run-docker-tests"]);
        match cli.command {
            Commands::RunDockerTests(args) => {
                assert!(!args.stack);
                assert_eq!(args.timeout, 60);
                assert!(args.report.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}

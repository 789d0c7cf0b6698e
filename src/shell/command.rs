//! External command execution.
//!
//! Everything the harness learns about the host (docker, systemctl,
//! journalctl, uname, ...) goes through the [`CommandRunner`] trait so the
//! runners can be exercised against a [`MockRunner`](super::MockRunner).
//! Commands are spawned directly from an argv, never through a shell.

use crate::error::{CompatError, Result};
use std::collections::HashMap;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Result of executing an external command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            duration: Duration::ZERO,
            success: true,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
            success: false,
        }
    }

    /// Trimmed stdout.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Convert an unsuccessful result into a [`CompatError::CommandFailed`].
    pub fn into_checked(self, command: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(CompatError::CommandFailed {
                command: command.to_string(),
                code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Render an argv as a single display string.
pub fn display_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Runs external programs.
///
/// `run` returns `Err` only when the program could not be started (most
/// often: not installed). A program that starts and exits non-zero is an
/// `Ok` result with `success == false`.
pub trait CommandRunner {
    /// Run a program with arguments and capture its output.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandResult>;

    /// Run a program and return its trimmed stdout if it exited 0.
    fn stdout_of(&self, program: &str, args: &[&str]) -> Option<String> {
        match self.run(program, args) {
            Ok(result) if result.success => Some(result.stdout_trimmed().to_string()),
            _ => None,
        }
    }

    /// Run a program and report whether it exited 0.
    fn succeeds(&self, program: &str, args: &[&str]) -> bool {
        self.run(program, args).map(|r| r.success).unwrap_or(false)
    }

    /// Run a program, converting a non-zero exit into an error.
    fn run_checked(&self, program: &str, args: &[&str]) -> Result<CommandResult> {
        self.run(program, args)?
            .into_checked(&display_command(program, args))
    }
}

/// [`CommandRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    env: HashMap<String, String>,
}

impl SystemRunner {
    /// Create a runner that inherits the process environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment variable passed to every spawned command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandResult> {
        let start = Instant::now();
        tracing::debug!("Running: {}", display_command(program, args));

        let mut cmd = Command::new(program);
        cmd.args(args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());

        let output = cmd.output().map_err(|e| CompatError::CommandSpawn {
            program: program.to_string(),
            message: e.to_string(),
        })?;

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok(CommandResult {
            exit_code: output.status.code(),
            stdout,
            stderr,
            duration,
            success: output.status.success(),
        })
    }
}

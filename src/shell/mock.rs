//! Scripted command runner for testing.
//!
//! `MockRunner` implements [`CommandRunner`] by looking up the full command
//! line in a table of canned results. Unknown commands behave like a
//! program that is not installed. Every invocation is recorded.
//!
//! # Example
//!
//! ```
//! use pgcompat::shell::{CommandResult, CommandRunner, MockRunner};
//!
//! let runner = MockRunner::new();
//! runner.respond("uname -r", CommandResult::success("6.8.0-1012-aws\n"));
//!
//! assert_eq!(runner.stdout_of("uname", &["-r"]).as_deref(), Some("6.8.0-1012-aws"));
//! assert!(runner.run("docker", &["info"]).is_err());
//! assert!(runner.was_called("uname -r"));
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use crate::error::{CompatError, Result};

use super::command::{display_command, CommandResult, CommandRunner};

/// Command runner with scripted responses.
#[derive(Debug, Default)]
pub struct MockRunner {
    responses: RefCell<HashMap<String, CommandResult>>,
    queues: RefCell<HashMap<String, VecDeque<CommandResult>>>,
    calls: RefCell<Vec<String>>,
}

impl MockRunner {
    /// Create a runner where every program is missing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the result returned for a full command line.
    pub fn respond(&self, command: &str, result: CommandResult) {
        self.responses
            .borrow_mut()
            .insert(command.to_string(), result);
    }

    /// Shorthand for a successful command with the given stdout.
    pub fn respond_ok(&self, command: &str, stdout: &str) {
        self.respond(command, CommandResult::success(stdout));
    }

    /// Queue results for a command called several times.
    ///
    /// Queued results are consumed first; afterwards the fixed response
    /// from [`respond`](Self::respond) applies.
    pub fn queue(&self, command: &str, results: Vec<CommandResult>) {
        self.queues
            .borrow_mut()
            .insert(command.to_string(), results.into_iter().collect());
    }

    /// All command lines that were run, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Check whether a command line was run.
    pub fn was_called(&self, command: &str) -> bool {
        self.calls.borrow().iter().any(|c| c == command)
    }

    /// Check whether any command line starting with `prefix` was run.
    pub fn was_called_with_prefix(&self, prefix: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with(prefix))
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandResult> {
        let line = display_command(program, args);
        self.calls.borrow_mut().push(line.clone());

        if let Some(queue) = self.queues.borrow_mut().get_mut(&line) {
            if let Some(result) = queue.pop_front() {
                return Ok(result);
            }
        }

        match self.responses.borrow().get(&line) {
            Some(result) => Ok(result.clone()),
            None => Err(CompatError::CommandSpawn {
                program: program.to_string(),
                message: "No such file or directory (os error 2)".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_is_spawn_error() {
        let runner = MockRunner::new();
        let err = runner.run("docker", &["--version"]).unwrap_err();
        assert!(matches!(err, CompatError::CommandSpawn { .. }));
    }

    #[test]
    fn responds_with_canned_result() {
        let runner = MockRunner::new();
        runner.respond_ok("docker --version", "Docker version 27.1.1\n");
        let result = runner.run("docker", &["--version"]).unwrap();
        assert!(result.success);
        assert_eq!(result.stdout_trimmed(), "Docker version 27.1.1");
    }

    #[test]
    fn queued_results_are_consumed_in_order() {
        let runner = MockRunner::new();
        runner.queue(
            "docker ps",
            vec![
                CommandResult::success("a"),
                CommandResult::failure(Some(1), "b"),
            ],
        );
        runner.respond_ok("docker ps", "fallback");

        assert!(runner.run("docker", &["ps"]).unwrap().success);
        assert!(!runner.run("docker", &["ps"]).unwrap().success);
        assert_eq!(
            runner.run("docker", &["ps"]).unwrap().stdout_trimmed(),
            "fallback"
        );
    }

    #[test]
    fn records_calls() {
        let runner = MockRunner::new();
        let _ = runner.run("uname", &["-m"]);
        let _ = runner.run("df", &["-h", "/"]);
        assert_eq!(runner.calls(), vec!["uname -m", "df -h /"]);
        assert!(runner.was_called_with_prefix("df"));
    }
}

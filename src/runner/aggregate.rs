//! Run every runner whose environment is present.

use serde::Serialize;

use crate::docker::DockerCli;
use crate::shell::CommandRunner;

use super::{RunOutcome, RunProgress, RunReport, Runner, RunnerKind};

/// Environments available on this host, in execution order.
///
/// Docker counts when its daemon answers. The AMI runner counts when the
/// `postgresql` unit is active or a `psql` client is installed.
pub fn detect_environments(runner: &dyn CommandRunner) -> Vec<RunnerKind> {
    let mut kinds = Vec::new();

    if DockerCli::new(runner).is_available() {
        kinds.push(RunnerKind::Docker);
    }

    let service_active = runner
        .run("systemctl", &["is-active", "postgresql"])
        .map(|r| r.stdout_trimmed() == "active")
        .unwrap_or(false);
    if service_active || runner.succeeds("psql", &["--version"]) {
        kinds.push(RunnerKind::Ami);
    }

    tracing::debug!("Detected environments: {:?}", kinds);
    kinds
}

/// A runner that could not complete.
#[derive(Debug, Clone, Serialize)]
pub struct RunnerError {
    pub kind: RunnerKind,
    pub message: String,
}

/// Combined result of every invoked runner.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub outcome: RunOutcome,
    pub reports: Vec<RunReport>,
    pub errors: Vec<RunnerError>,
}

impl AggregateResult {
    /// Process exit code.
    ///
    /// Invoking no runner is success unless `require_environment` is set.
    pub fn exit_code(&self, require_environment: bool) -> i32 {
        match self.outcome {
            RunOutcome::Passed => 0,
            RunOutcome::Failed => 1,
            RunOutcome::Skipped if require_environment => 1,
            RunOutcome::Skipped => 0,
        }
    }
}

/// Invoke each runner in turn and AND their outcomes.
///
/// A runner returning `Err` counts as failed; later runners still run.
pub fn run_all(
    runners: Vec<Box<dyn Runner + '_>>,
    on_progress: &mut dyn FnMut(RunnerKind, RunProgress<'_>),
) -> AggregateResult {
    let mut reports = Vec::new();
    let mut errors = Vec::new();
    let mut outcomes = Vec::new();

    for mut runner in runners {
        let kind = runner.kind();
        match runner.run(&mut |event| on_progress(kind, event)) {
            Ok(report) => {
                outcomes.push(report.outcome);
                reports.push(report);
            }
            Err(e) => {
                tracing::debug!("{} runner failed: {}", kind, e);
                outcomes.push(RunOutcome::Failed);
                errors.push(RunnerError {
                    kind,
                    message: e.to_string(),
                });
            }
        }
    }

    AggregateResult {
        outcome: RunOutcome::combine(outcomes),
        reports,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::{CheckOutcome, Checklist};
    use crate::error::CompatError;
    use crate::runner::PhaseTracker;
    use crate::shell::{CommandResult, MockRunner};
    use chrono::Utc;
    use std::time::Instant;

    struct FixedRunner {
        kind: RunnerKind,
        outcome: Option<CheckOutcome>,
    }

    impl Runner for FixedRunner {
        fn kind(&self) -> RunnerKind {
            self.kind
        }

        fn run(&mut self, on_progress: &mut dyn FnMut(RunProgress<'_>)) -> crate::Result<RunReport> {
            let Some(outcome) = self.outcome.clone() else {
                return Err(CompatError::RuntimeUnavailable {
                    runtime: "docker".into(),
                    message: "gone".into(),
                });
            };
            on_progress(RunProgress::Note("running"));
            let mut checklist = Checklist::new();
            checklist.run("only", || outcome);
            Ok(RunReport::finish(
                self.kind,
                Utc::now(),
                Instant::now(),
                PhaseTracker::new(),
                checklist,
                None,
            ))
        }
    }

    fn fixed(kind: RunnerKind, outcome: Option<CheckOutcome>) -> Box<dyn Runner> {
        Box::new(FixedRunner { kind, outcome })
    }

    #[test]
    fn nothing_detected_on_bare_host() {
        assert!(detect_environments(&MockRunner::new()).is_empty());
    }

    #[test]
    fn detects_docker_and_local_service() {
        let runner = MockRunner::new();
        runner.respond_ok("docker --version", "Docker version 27.1.1\n");
        runner.respond_ok("docker info --format {{.ServerVersion}}", "27.1.1\n");
        runner.respond_ok("systemctl is-active postgresql", "active\n");
        assert_eq!(
            detect_environments(&runner),
            vec![RunnerKind::Docker, RunnerKind::Ami]
        );
    }

    #[test]
    fn psql_client_alone_enables_ami() {
        let runner = MockRunner::new();
        runner.respond(
            "systemctl is-active postgresql",
            CommandResult {
                stdout: "inactive\n".into(),
                ..CommandResult::failure(Some(3), "")
            },
        );
        runner.respond_ok("psql --version", "psql (PostgreSQL) 16.4\n");
        assert_eq!(detect_environments(&runner), vec![RunnerKind::Ami]);
    }

    #[test]
    fn docker_daemon_down_is_not_detected() {
        let runner = MockRunner::new();
        runner.respond_ok("docker --version", "Docker version 27.1.1\n");
        runner.respond(
            "docker info --format {{.ServerVersion}}",
            CommandResult::failure(Some(1), "Cannot connect"),
        );
        assert!(detect_environments(&runner).is_empty());
    }

    #[test]
    fn empty_run_is_skipped() {
        let result = run_all(Vec::new(), &mut |_, _| {});
        assert_eq!(result.outcome, RunOutcome::Skipped);
        assert_eq!(result.exit_code(false), 0);
        assert_eq!(result.exit_code(true), 1);
    }

    #[test]
    fn one_failure_fails_the_whole_run() {
        let result = run_all(
            vec![
                fixed(RunnerKind::Docker, Some(CheckOutcome::failed("x"))),
                fixed(RunnerKind::Ami, Some(CheckOutcome::Passed)),
            ],
            &mut |_, _| {},
        );
        assert_eq!(result.outcome, RunOutcome::Failed);
        assert_eq!(result.reports.len(), 2);
        assert_eq!(result.exit_code(false), 1);
    }

    #[test]
    fn runner_error_counts_as_failure_and_later_runners_still_run() {
        let mut seen = Vec::new();
        let result = run_all(
            vec![
                fixed(RunnerKind::Docker, None),
                fixed(RunnerKind::Ami, Some(CheckOutcome::Passed)),
            ],
            &mut |kind, _| seen.push(kind),
        );
        assert_eq!(result.outcome, RunOutcome::Failed);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, RunnerKind::Docker);
        assert_eq!(seen, vec![RunnerKind::Ami]);
    }

    #[test]
    fn all_passing_runners_pass() {
        let result = run_all(
            vec![
                fixed(RunnerKind::Docker, Some(CheckOutcome::Passed)),
                fixed(RunnerKind::Ami, Some(CheckOutcome::skipped("n/a"))),
            ],
            &mut |_, _| {},
        );
        assert_eq!(result.outcome, RunOutcome::Passed);
        assert_eq!(result.exit_code(true), 0);
    }
}

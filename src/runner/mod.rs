//! Compatibility runs.
//!
//! A run walks through a fixed lifecycle:
//! `not-started -> provisioning -> checking -> tearing-down -> done`.
//! Teardown is reached on every path that returns, and the resource guards
//! in [`guard`] and [`workdir`] cover the paths that unwind instead.
//!
//! - [`docker`] - Provision a container and check it
//! - [`ami`] - Check a database service already running on this host
//! - [`aggregate`] - Detect environments and combine runner outcomes
//! - [`cleanup`] - Remove resources left behind by interrupted runs

pub mod aggregate;
pub mod ami;
pub mod cleanup;
pub mod docker;
pub mod guard;
pub mod workdir;

pub use aggregate::{detect_environments, run_all, AggregateResult};
pub use ami::{AmiRunOptions, AmiRunner};
pub use cleanup::{cleanup, CleanupOptions, CleanupSummary};
pub use docker::{DockerRunOptions, DockerRunner};
pub use guard::{ContainerGuard, Teardown};
pub use workdir::WorkDir;

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::checks::{CheckResult, Checklist};
use crate::error::{CompatError, Result};

/// Which environment a runner targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerKind {
    Docker,
    Ami,
}

impl RunnerKind {
    /// Short machine name, used in directory prefixes.
    pub fn name(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Ami => "ami",
        }
    }
}

impl std::fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Docker => write!(f, "Docker container"),
            Self::Ami => write!(f, "AMI host"),
        }
    }
}

/// Overall result of one or more runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Passed,
    Failed,
    /// Nothing was run.
    Skipped,
}

impl RunOutcome {
    /// Outcome of a finished checklist.
    pub fn from_checklist(checklist: &Checklist) -> Self {
        if checklist.all_passed() {
            Self::Passed
        } else {
            Self::Failed
        }
    }

    /// Logical AND over several outcomes. No outcomes at all is `Skipped`.
    pub fn combine(outcomes: impl IntoIterator<Item = RunOutcome>) -> Self {
        outcomes
            .into_iter()
            .fold(Self::Skipped, |acc, next| match (acc, next) {
                (Self::Failed, _) | (_, Self::Failed) => Self::Failed,
                (Self::Skipped, other) => other,
                (Self::Passed, _) => Self::Passed,
            })
    }

    pub fn is_failure(self) -> bool {
        self == Self::Failed
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunPhase {
    NotStarted,
    Provisioning,
    Checking,
    TearingDown,
    Done,
}

impl RunPhase {
    /// Whether a run may move from `self` to `next`.
    ///
    /// Provisioning may jump straight to teardown when nothing could be
    /// provisioned.
    pub fn can_advance_to(self, next: RunPhase) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Provisioning)
                | (Self::Provisioning, Self::Checking)
                | (Self::Provisioning, Self::TearingDown)
                | (Self::Checking, Self::TearingDown)
                | (Self::TearingDown, Self::Done)
        )
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotStarted => "not-started",
            Self::Provisioning => "provisioning",
            Self::Checking => "checking",
            Self::TearingDown => "tearing-down",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// When a phase was entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseRecord {
    pub phase: RunPhase,
    pub entered_at: DateTime<Utc>,
}

/// Enforces the run lifecycle and remembers when each phase began.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: RunPhase,
    history: Vec<PhaseRecord>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: RunPhase::NotStarted,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> RunPhase {
        self.current
    }

    /// Move to `next`, rejecting transitions outside the lifecycle.
    pub fn advance(&mut self, next: RunPhase) -> Result<()> {
        if !self.current.can_advance_to(next) {
            return Err(CompatError::InvalidPhaseTransition {
                from: self.current.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!("Run phase {} -> {}", self.current, next);
        self.current = next;
        self.history.push(PhaseRecord {
            phase: next,
            entered_at: Utc::now(),
        });
        Ok(())
    }

    pub fn history(&self) -> &[PhaseRecord] {
        &self.history
    }

    pub fn into_history(self) -> Vec<PhaseRecord> {
        self.history
    }
}

/// Progress events emitted while a runner works.
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// A new lifecycle phase began.
    Phase(RunPhase),
    /// A check finished.
    Check(&'a CheckResult),
    /// A potentially slow step started; it ends with the next event.
    Action(&'a str),
    /// Something worth telling the user.
    Note(&'a str),
    /// Bulk diagnostic output such as logs, shown in verbose mode only.
    Detail { title: &'a str, text: &'a str },
    /// A non-fatal problem, typically during teardown.
    Warning(&'a str),
}

/// Machine-readable record of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub kind: RunnerKind,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub phases: Vec<PhaseRecord>,
    pub checks: Vec<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown: Option<Teardown>,
}

impl RunReport {
    /// Assemble a report from a finished run.
    pub fn finish(
        kind: RunnerKind,
        started_at: DateTime<Utc>,
        start: Instant,
        phases: PhaseTracker,
        checklist: Checklist,
        teardown: Option<Teardown>,
    ) -> Self {
        Self {
            kind,
            outcome: RunOutcome::from_checklist(&checklist),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            phases: phases.into_history(),
            checks: checklist.into_results(),
            teardown,
        }
    }

    pub fn passed(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.outcome == crate::checks::CheckOutcome::Passed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.checks.iter().filter(|c| c.outcome.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.checks.len() - self.passed() - self.failed()
    }
}

/// Serialize any report to a JSON file.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CompatError::Other(anyhow::Error::new(e)))?;
    std::fs::write(path, json)?;
    Ok(())
}

/// A runnable compatibility target.
pub trait Runner {
    fn kind(&self) -> RunnerKind;

    /// Execute the full lifecycle.
    ///
    /// `Err` means the run could not start at all; failed checks are
    /// reported through the returned [`RunReport`].
    fn run(&mut self, on_progress: &mut dyn FnMut(RunProgress<'_>)) -> Result<RunReport>;
}

/// Forward checks recorded since `*seen` to the progress callback.
pub(crate) fn emit_new_checks(
    checklist: &Checklist,
    seen: &mut usize,
    on_progress: &mut dyn FnMut(RunProgress<'_>),
) {
    for result in &checklist.results()[*seen..] {
        on_progress(RunProgress::Check(result));
    }
    *seen = checklist.results().len();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::CheckOutcome;

    #[test]
    fn full_lifecycle_is_accepted() {
        let mut tracker = PhaseTracker::new();
        for phase in [
            RunPhase::Provisioning,
            RunPhase::Checking,
            RunPhase::TearingDown,
            RunPhase::Done,
        ] {
            tracker.advance(phase).unwrap();
        }
        assert_eq!(tracker.current(), RunPhase::Done);
        assert_eq!(tracker.history().len(), 4);
    }

    #[test]
    fn provisioning_can_skip_checking() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(RunPhase::Provisioning).unwrap();
        tracker.advance(RunPhase::TearingDown).unwrap();
        tracker.advance(RunPhase::Done).unwrap();
    }

    #[test]
    fn backwards_transition_is_rejected() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(RunPhase::Provisioning).unwrap();
        tracker.advance(RunPhase::Checking).unwrap();
        let err = tracker.advance(RunPhase::Provisioning).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid run phase transition: checking -> provisioning"
        );
        assert_eq!(tracker.current(), RunPhase::Checking);
    }

    #[test]
    fn teardown_cannot_be_skipped() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(RunPhase::Provisioning).unwrap();
        tracker.advance(RunPhase::Checking).unwrap();
        assert!(tracker.advance(RunPhase::Done).is_err());
    }

    #[test]
    fn combine_is_logical_and() {
        use RunOutcome::*;
        assert_eq!(RunOutcome::combine(std::iter::empty()), Skipped);
        assert_eq!(RunOutcome::combine([Passed]), Passed);
        assert_eq!(RunOutcome::combine([Passed, Failed]), Failed);
        assert_eq!(RunOutcome::combine([Failed, Passed]), Failed);
        assert_eq!(RunOutcome::combine([Skipped, Passed]), Passed);
        assert_eq!(RunOutcome::combine([Skipped, Skipped]), Skipped);
    }

    #[test]
    fn report_counts_and_serializes() {
        let mut checklist = Checklist::new();
        checklist.run("a", || CheckOutcome::Passed);
        checklist.run("b", || CheckOutcome::failed("x"));
        checklist.run("c", || CheckOutcome::skipped("y"));
        let mut phases = PhaseTracker::new();
        phases.advance(RunPhase::Provisioning).unwrap();

        let report = RunReport::finish(
            RunnerKind::Ami,
            Utc::now(),
            Instant::now(),
            phases,
            checklist,
            None,
        );
        assert_eq!(report.outcome, RunOutcome::Failed);
        assert_eq!((report.passed(), report.failed(), report.skipped()), (1, 1, 1));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json(&report, &path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["kind"], "ami");
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["phases"][0]["phase"], "provisioning");
        assert_eq!(json["checks"].as_array().unwrap().len(), 3);
        assert!(json.get("teardown").is_none());
    }
}

//! Compatibility checks.
//!
//! A check is a named closure producing a [`CheckOutcome`]. The
//! [`Checklist`] runs checks one after another, records every result and
//! never stops early: a failing check is data, not an error.
//!
//! - [`sql`] - Database checks shared by both runners
//! - [`system`] - OS and system library checks
//! - [`services`] - systemd unit checks
//!
//! # Example
//!
//! ```
//! use pgcompat::checks::{CheckOutcome, Checklist};
//!
//! let mut checklist = Checklist::new();
//! checklist.run("arithmetic works", || CheckOutcome::expect(1 + 1 == 2, || "math".into()));
//! checklist.run("always fails", || CheckOutcome::failed("nope"));
//!
//! assert_eq!(checklist.passed(), 1);
//! assert_eq!(checklist.failed(), 1);
//! assert!(!checklist.all_passed());
//! ```

pub mod services;
pub mod sql;
pub mod system;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::ui::StatusKind;

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed,
    Failed(String),
    /// Not applicable on this host; does not fail the run.
    Skipped(String),
}

impl CheckOutcome {
    /// Failed with a message.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Skipped with a reason.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    /// Passed if `condition` holds, otherwise failed with the lazily built message.
    pub fn expect(condition: bool, msg: impl FnOnce() -> String) -> Self {
        if condition {
            Self::Passed
        } else {
            Self::Failed(msg())
        }
    }

    /// Whether the outcome counts against the run.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Failure or skip detail.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Passed => None,
            Self::Failed(d) | Self::Skipped(d) => Some(d.as_str()),
        }
    }

    /// Display status for this outcome.
    pub fn status_kind(&self) -> StatusKind {
        match self {
            Self::Passed => StatusKind::Success,
            Self::Failed(_) => StatusKind::Failed,
            Self::Skipped(_) => StatusKind::Skipped,
        }
    }
}

impl<E: std::fmt::Display> From<std::result::Result<(), E>> for CheckOutcome {
    fn from(result: std::result::Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// A recorded check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub outcome: CheckOutcome,
    pub duration_ms: u64,
}

impl CheckResult {
    /// Build a result with no timing.
    pub fn new(name: impl Into<String>, outcome: CheckOutcome) -> Self {
        Self {
            name: name.into(),
            outcome,
            duration_ms: 0,
        }
    }

    /// Elapsed time as a `Duration`.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Ordered record of executed checks.
#[derive(Debug, Clone, Default)]
pub struct Checklist {
    results: Vec<CheckResult>,
}

impl Checklist {
    /// Create an empty checklist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a check and record its outcome.
    ///
    /// A check that panics is recorded as failed with the panic message.
    pub fn run<F>(&mut self, name: impl Into<String>, check: F) -> &CheckOutcome
    where
        F: FnOnce() -> CheckOutcome,
    {
        let name = name.into();
        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(check))
            .unwrap_or_else(|payload| CheckOutcome::failed(panic_message(payload.as_ref())));
        let duration_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            CheckOutcome::Passed => tracing::debug!("check passed: {}", name),
            CheckOutcome::Failed(msg) => tracing::debug!("check failed: {}: {}", name, msg),
            CheckOutcome::Skipped(msg) => tracing::debug!("check skipped: {}: {}", name, msg),
        }

        self.results.push(CheckResult {
            name,
            outcome,
            duration_ms,
        });
        &self.results[self.results.len() - 1].outcome
    }

    /// Record a result without running anything.
    pub fn record(&mut self, result: CheckResult) {
        self.results.push(result);
    }

    /// Record every remaining check as skipped for the same reason.
    pub fn skip_all(&mut self, names: &[&str], reason: &str) {
        for name in names {
            self.record(CheckResult::new(*name, CheckOutcome::skipped(reason)));
        }
    }

    /// All recorded results in execution order.
    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    /// Consume the checklist into its results.
    pub fn into_results(self) -> Vec<CheckResult> {
        self.results
    }

    /// Number of passed checks.
    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, CheckOutcome::Passed))
    }

    /// Number of failed checks.
    pub fn failed(&self) -> usize {
        self.count(CheckOutcome::is_failure)
    }

    /// Number of skipped checks.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, CheckOutcome::Skipped(_)))
    }

    /// True when no recorded check failed.
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&CheckOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("check panicked: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_do_not_stop_later_checks() {
        let mut checklist = Checklist::new();
        checklist.run("first", || CheckOutcome::failed("broken"));
        checklist.run("second", || CheckOutcome::Passed);
        checklist.run("third", || CheckOutcome::skipped("n/a"));

        let names: Vec<_> = checklist.results().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(checklist.passed(), 1);
        assert_eq!(checklist.failed(), 1);
        assert_eq!(checklist.skipped(), 1);
    }

    #[test]
    fn panicking_check_is_recorded_as_failure() {
        let mut checklist = Checklist::new();
        checklist.run("explodes", || panic!("index out of range"));
        checklist.run("after", || CheckOutcome::Passed);

        assert_eq!(
            checklist.results()[0].outcome,
            CheckOutcome::Failed("check panicked: index out of range".into())
        );
        assert_eq!(checklist.passed(), 1);
        assert_eq!(checklist.failed(), 1);
    }

    #[test]
    fn formatted_panic_message_is_kept() {
        let mut checklist = Checklist::new();
        let code = 42;
        checklist.run("explodes", || panic!("exit code {}", code));
        assert_eq!(
            checklist.results()[0].outcome.detail(),
            Some("check panicked: exit code 42")
        );
    }

    #[test]
    fn skipped_checks_do_not_fail_the_run() {
        let mut checklist = Checklist::new();
        checklist.run("a", || CheckOutcome::Passed);
        checklist.run("b", || CheckOutcome::skipped("tool missing"));
        assert!(checklist.all_passed());
    }

    #[test]
    fn empty_checklist_passes() {
        assert!(Checklist::new().all_passed());
    }

    #[test]
    fn run_returns_recorded_outcome() {
        let mut checklist = Checklist::new();
        let outcome = checklist.run("x", || CheckOutcome::failed("bad")).clone();
        assert_eq!(outcome, CheckOutcome::Failed("bad".into()));
    }

    #[test]
    fn skip_all_records_reason() {
        let mut checklist = Checklist::new();
        checklist.skip_all(&["a", "b"], "database not ready");
        assert_eq!(checklist.skipped(), 2);
        assert_eq!(
            checklist.results()[1].outcome.detail(),
            Some("database not ready")
        );
    }

    #[test]
    fn outcome_from_result() {
        let ok: std::result::Result<(), String> = Ok(());
        let err: std::result::Result<(), String> = Err("boom".into());
        assert_eq!(CheckOutcome::from(ok), CheckOutcome::Passed);
        assert_eq!(CheckOutcome::from(err), CheckOutcome::Failed("boom".into()));
    }

    #[test]
    fn expect_builds_message_lazily() {
        assert_eq!(
            CheckOutcome::expect(true, || panic!("not called")),
            CheckOutcome::Passed
        );
        assert!(CheckOutcome::expect(false, || "nope".into()).is_failure());
    }

    #[test]
    fn result_serializes_tagged_outcome() {
        let result = CheckResult::new("version", CheckOutcome::failed("old"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["name"], "version");
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["detail"], "old");
    }

    #[test]
    fn outcome_maps_to_status_kind() {
        assert_eq!(CheckOutcome::Passed.status_kind(), StatusKind::Success);
        assert_eq!(CheckOutcome::failed("x").status_kind(), StatusKind::Failed);
        assert_eq!(CheckOutcome::skipped("x").status_kind(), StatusKind::Skipped);
    }
}

//! Compatibility run against the database service installed on this host.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::checks::services::run_service_checks;
use crate::checks::sql::{run_sql_checks, SqlContext, SQL_CHECK_NAMES};
use crate::checks::system::run_system_checks;
use crate::checks::Checklist;
use crate::config::{Expectations, Settings};
use crate::database::{wait_for_postgres, ConnectionTarget, Database, RetryPolicy};
use crate::error::Result;
use crate::probe::OsRelease;
use crate::shell::CommandRunner;

use super::workdir::WorkDir;
use super::{emit_new_checks, PhaseTracker, RunPhase, RunProgress, RunReport, Runner, RunnerKind};

/// systemd unit whose journal is kept when the database is unreachable.
const DATABASE_UNIT: &str = "postgresql";

/// Knobs for an AMI run.
#[derive(Debug, Clone)]
pub struct AmiRunOptions {
    pub skip_system: bool,
    pub skip_services: bool,
    /// How long to wait for the local service to accept connections.
    pub readiness: RetryPolicy,
    /// Journal lines kept when the service never accepts connections.
    pub log_tail: usize,
}

impl Default for AmiRunOptions {
    fn default() -> Self {
        Self {
            skip_system: false,
            skip_services: false,
            readiness: RetryPolicy::default().with_timeout(Duration::from_secs(10)),
            log_tail: 50,
        }
    }
}

/// Runs system, SQL and service checks on the current host.
pub struct AmiRunner<'a> {
    commands: &'a dyn CommandRunner,
    db: &'a dyn Database,
    settings: &'a Settings,
    expectations: &'a Expectations,
    options: AmiRunOptions,
    release: Option<OsRelease>,
    temp_root: Option<PathBuf>,
}

impl<'a> AmiRunner<'a> {
    /// Create a runner; the os-release file is read immediately.
    pub fn new(
        commands: &'a dyn CommandRunner,
        db: &'a dyn Database,
        settings: &'a Settings,
        expectations: &'a Expectations,
        options: AmiRunOptions,
    ) -> Self {
        Self {
            commands,
            db,
            settings,
            expectations,
            options,
            release: OsRelease::read(),
            temp_root: None,
        }
    }

    /// Check against a given release instead of the host's.
    pub fn with_release(mut self, release: Option<OsRelease>) -> Self {
        self.release = release;
        self
    }

    /// Create the working directory under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Keep the database unit's recent journal in the working directory.
    fn save_journal(&self, workdir: &WorkDir, on_progress: &mut dyn FnMut(RunProgress<'_>)) {
        let tail = self.options.log_tail.to_string();
        let Some(journal) = self.commands.stdout_of(
            "journalctl",
            &["-u", DATABASE_UNIT, "-n", tail.as_str(), "-q", "--no-pager"],
        ) else {
            tracing::debug!("No journal available for {}", DATABASE_UNIT);
            return;
        };
        if journal.is_empty() {
            return;
        }
        match workdir.write(&format!("{}.log", DATABASE_UNIT), &journal) {
            Ok(path) => tracing::debug!("Saved journal of {} to {}", DATABASE_UNIT, path.display()),
            Err(e) => tracing::warn!("Could not save journal of {}: {}", DATABASE_UNIT, e),
        }
        on_progress(RunProgress::Detail {
            title: "service journal",
            text: &journal,
        });
    }

    fn sql_check_names(&self) -> Vec<String> {
        SQL_CHECK_NAMES
            .iter()
            .map(|n| n.to_string())
            .chain(
                self.expectations
                    .database
                    .loadable_extensions
                    .iter()
                    .map(|ext| format!("extension {} loads", ext)),
            )
            .collect()
    }
}

impl Runner for AmiRunner<'_> {
    fn kind(&self) -> RunnerKind {
        RunnerKind::Ami
    }

    fn run(&mut self, on_progress: &mut dyn FnMut(RunProgress<'_>)) -> Result<RunReport> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut phases = PhaseTracker::new();
        let mut checklist = Checklist::new();
        let mut seen = 0;

        phases.advance(RunPhase::Provisioning)?;
        on_progress(RunProgress::Phase(RunPhase::Provisioning));
        let workdir = match &self.temp_root {
            Some(root) => WorkDir::create_in(RunnerKind::Ami, root)?,
            None => WorkDir::create(RunnerKind::Ami)?,
        };
        let target = ConnectionTarget::from_settings(self.settings);
        on_progress(RunProgress::Action(&format!(
            "Connecting to PostgreSQL on {}",
            target.endpoint()
        )));
        let ready = !checklist
            .run("database service reachable", || {
                wait_for_postgres(self.db, &target, &self.options.readiness).into()
            })
            .is_failure();
        emit_new_checks(&checklist, &mut seen, on_progress);
        if !ready {
            self.save_journal(&workdir, on_progress);
        }

        phases.advance(RunPhase::Checking)?;
        on_progress(RunProgress::Phase(RunPhase::Checking));

        if self.options.skip_system {
            on_progress(RunProgress::Note("Skipping system checks"));
        } else {
            run_system_checks(
                &mut checklist,
                self.commands,
                self.release.as_ref(),
                &self.expectations.os,
            );
            emit_new_checks(&checklist, &mut seen, on_progress);
        }

        if ready {
            let ctx = SqlContext {
                db: self.db,
                target: &target,
                expectations: &self.expectations.database,
            };
            run_sql_checks(&mut checklist, &ctx);
        } else {
            let names = self.sql_check_names();
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            checklist.skip_all(&names, "database not ready");
        }
        emit_new_checks(&checklist, &mut seen, on_progress);

        if self.options.skip_services {
            on_progress(RunProgress::Note("Skipping service checks"));
        } else {
            run_service_checks(&mut checklist, self.commands, &self.expectations.services);
            emit_new_checks(&checklist, &mut seen, on_progress);
        }

        // Only the working directory is ours to release; the service stays.
        phases.advance(RunPhase::TearingDown)?;
        on_progress(RunProgress::Phase(RunPhase::TearingDown));
        if let Err(e) = workdir.close() {
            let message = format!("failed to remove working directory: {}", e);
            tracing::warn!("{}", message);
            on_progress(RunProgress::Warning(&message));
        }
        phases.advance(RunPhase::Done)?;
        on_progress(RunProgress::Phase(RunPhase::Done));

        Ok(RunReport::finish(
            RunnerKind::Ami,
            started_at,
            start,
            phases,
            checklist,
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::sql;
    use crate::config::DatabaseExpectations;
    use crate::database::{MockDatabase, Rows};
    use crate::runner::RunOutcome;
    use crate::shell::MockRunner;

    fn fast() -> AmiRunOptions {
        AmiRunOptions {
            readiness: RetryPolicy {
                timeout: Duration::from_millis(30),
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(10),
            },
            ..AmiRunOptions::default()
        }
    }

    fn lean() -> Expectations {
        Expectations {
            database: DatabaseExpectations {
                extensions: vec![],
                loadable_extensions: vec![],
                ..DatabaseExpectations::default()
            },
            ..Expectations::default()
        }
    }

    fn healthy_db() -> MockDatabase {
        let db = MockDatabase::new();
        db.respond(sql::VERSION_SQL, Rows::from_values(&[&["PostgreSQL 15.8"]]));
        db.respond(sql::SELECT_ONE_SQL, Rows::from_values(&[&["1"]]));
        db.respond(sql::ROUND_TRIP_SQL, Rows::from_values(&[&["2", "gamma"]]));
        db.respond(sql::WAL_LEVEL_SQL, Rows::from_values(&[&["logical"]]));
        db.respond(sql::REPLICATION_SLOTS_SQL, Rows::from_values(&[&["10"]]));
        db
    }

    #[test]
    fn sql_only_run_passes() {
        let temp = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let db = healthy_db();
        let settings = Settings::default();
        let exp = lean();
        let options = AmiRunOptions {
            skip_system: true,
            skip_services: true,
            ..fast()
        };

        let report = AmiRunner::new(&runner, &db, &settings, &exp, options)
            .with_temp_root(temp.path())
            .run(&mut |_| {})
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Passed, "{:#?}", report.checks);
        assert!(runner.calls().is_empty());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
        assert!(!report
            .checks
            .iter()
            .any(|c| c.name == "wrong password rejected"));
        assert_eq!(report.phases.last().unwrap().phase, RunPhase::Done);
    }

    #[test]
    fn unreachable_service_skips_sql_but_runs_system_checks() {
        let temp = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        runner.respond_ok("uname -r", "6.8.0-1012-aws\n");
        let db = MockDatabase::unreachable();
        let settings = Settings::default();
        let exp = lean();
        let options = AmiRunOptions {
            skip_services: true,
            ..fast()
        };
        let release = OsRelease::parse("ID=ubuntu\nVERSION_ID=\"24.04\"\nVERSION=\"24.04 LTS\"\n");

        let report = AmiRunner::new(&runner, &db, &settings, &exp, options)
            .with_release(Some(release))
            .with_temp_root(temp.path())
            .run(&mut |_| {})
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Failed);
        let by_name = |name: &str| {
            report
                .checks
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.outcome.clone())
        };
        assert!(by_name("database service reachable").unwrap().is_failure());
        assert_eq!(by_name("operating system release"), Some(crate::checks::CheckOutcome::Passed));
        assert_eq!(by_name("kernel version"), Some(crate::checks::CheckOutcome::Passed));
        assert_eq!(
            by_name("SELECT 1 returns 1").unwrap().detail(),
            Some("database not ready")
        );
    }

    #[test]
    fn services_are_checked_unless_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        let db = healthy_db();
        let settings = Settings::default();
        let exp = lean();
        let options = AmiRunOptions {
            skip_system: true,
            ..fast()
        };

        let report = AmiRunner::new(&runner, &db, &settings, &exp, options)
            .with_temp_root(temp.path())
            .run(&mut |_| {})
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Failed);
        assert!(runner.was_called("systemctl show postgresql"));
        assert!(report
            .checks
            .iter()
            .any(|c| c.name == "service salt-minion healthy" && c.outcome.is_failure()));
    }

    #[test]
    fn unreachable_service_reports_its_journal() {
        let temp = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        runner.respond_ok(
            "journalctl -u postgresql -n 50 -q --no-pager",
            "FATAL: could not bind IPv4 address\n",
        );
        let db = MockDatabase::unreachable();
        let settings = Settings::default();
        let exp = lean();
        let options = AmiRunOptions {
            skip_system: true,
            skip_services: true,
            ..fast()
        };

        let mut details = Vec::new();
        let mut warnings = Vec::new();
        let report = AmiRunner::new(&runner, &db, &settings, &exp, options)
            .with_temp_root(temp.path())
            .run(&mut |event| match event {
                RunProgress::Detail { title, text } => {
                    details.push((title.to_string(), text.to_string()))
                }
                RunProgress::Warning(w) => warnings.push(w.to_string()),
                _ => {}
            })
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Failed);
        assert_eq!(
            details,
            vec![(
                "service journal".to_string(),
                "FATAL: could not bind IPv4 address".to_string()
            )]
        );
        assert!(warnings.is_empty(), "{:?}", warnings);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}

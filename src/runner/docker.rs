//! Container-based compatibility run.
//!
//! Starts a fresh PostgreSQL container (optionally with pgBouncer and
//! PostgREST next to it) on a per-run network, waits for it, runs the SQL
//! battery against the published port and tears everything down again.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::checks::sql::{self, SqlContext, SQL_CHECK_NAMES};
use crate::checks::{CheckOutcome, CheckResult, Checklist};
use crate::config::{Expectations, Settings};
use crate::database::{wait_for_http, wait_for_postgres, ConnectionTarget, Database, RetryPolicy};
use crate::docker::{ContainerSpec, DockerCli, RunId};
use crate::error::Result;
use crate::shell::CommandRunner;

use super::guard::ContainerGuard;
use super::workdir::WorkDir;
use super::{emit_new_checks, PhaseTracker, RunPhase, RunProgress, RunReport, Runner, RunnerKind};

/// Port PostgreSQL listens on inside its container.
pub const POSTGRES_CONTAINER_PORT: u16 = 5432;

/// Host the run's containers publish their ports on.
pub const PUBLISHED_HOST: &str = "localhost";

const CREDENTIAL_CHECK_NAMES: &[&str] = &["configured password accepted", "wrong password rejected"];
const PGBOUNCER_CHECK: &str = "pgbouncer accepts queries";
const POSTGREST_CHECK: &str = "PostgREST answers HTTP 200";
const POSTGREST_JWT_SECRET: &str = "pgcompat-throwaway-jwt-secret-0123456789";

/// Knobs for a container run.
#[derive(Debug, Clone)]
pub struct DockerRunOptions {
    /// Also start pgBouncer and PostgREST.
    pub stack: bool,
    /// Use images already present locally.
    pub skip_pull: bool,
    /// Readiness policy for PostgreSQL.
    pub readiness: RetryPolicy,
    /// Readiness policy for pgBouncer and PostgREST.
    pub stack_readiness: RetryPolicy,
    /// Container log lines kept when PostgreSQL never becomes ready.
    pub log_tail: usize,
}

impl Default for DockerRunOptions {
    fn default() -> Self {
        Self {
            stack: false,
            skip_pull: false,
            readiness: RetryPolicy::default(),
            stack_readiness: RetryPolicy::default().with_timeout(Duration::from_secs(30)),
            log_tail: 50,
        }
    }
}

/// Where the provisioned services can be reached from the host.
#[derive(Debug, Clone)]
struct Endpoints {
    postgres: ConnectionTarget,
    pgbouncer: Option<ConnectionTarget>,
    postgrest_url: Option<String>,
}

/// Runs the checklist against a throwaway container.
pub struct DockerRunner<'a> {
    commands: &'a dyn CommandRunner,
    db: &'a dyn Database,
    settings: &'a Settings,
    expectations: &'a Expectations,
    options: DockerRunOptions,
    run_id: RunId,
    temp_root: Option<PathBuf>,
}

impl<'a> DockerRunner<'a> {
    pub fn new(
        commands: &'a dyn CommandRunner,
        db: &'a dyn Database,
        settings: &'a Settings,
        expectations: &'a Expectations,
        options: DockerRunOptions,
    ) -> Self {
        Self {
            commands,
            db,
            settings,
            expectations,
            options,
            run_id: RunId::generate(),
            temp_root: None,
        }
    }

    /// Use a fixed run id instead of a generated one.
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    /// Create the working directory under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// PostgreSQL container for this run.
    pub fn postgres_spec(&self) -> ContainerSpec {
        ContainerSpec::new(
            self.run_id.container_name("postgres"),
            &self.settings.images.postgres,
        )
        .network(self.run_id.network_name())
        .envs(self.settings.postgres_container_env())
        .publish(POSTGRES_CONTAINER_PORT)
    }

    /// pgBouncer container in transaction pooling mode.
    pub fn pgbouncer_spec(&self) -> ContainerSpec {
        let s = self.settings;
        ContainerSpec::new(
            self.run_id.container_name("pgbouncer"),
            &s.images.pgbouncer,
        )
        .network(self.run_id.network_name())
        .env("DATABASES_HOST", self.run_id.container_name("postgres"))
        .env("DATABASES_PORT", POSTGRES_CONTAINER_PORT.to_string())
        .env("DATABASES_USER", &s.user)
        .env("DATABASES_PASSWORD", &s.password)
        .env("DATABASES_DBNAME", &s.database)
        .env("POOL_MODE", "transaction")
        .env("LISTEN_PORT", s.pgbouncer_port.to_string())
        .publish(s.pgbouncer_port)
    }

    /// PostgREST container pointed at the run's PostgreSQL.
    pub fn postgrest_spec(&self) -> ContainerSpec {
        let s = self.settings;
        let db_uri = format!(
            "postgres://{}:{}@{}:{}/{}",
            s.user,
            s.password,
            self.run_id.container_name("postgres"),
            POSTGRES_CONTAINER_PORT,
            s.database
        );
        ContainerSpec::new(
            self.run_id.container_name("postgrest"),
            &s.images.postgrest,
        )
        .network(self.run_id.network_name())
        .env("PGRST_DB_URI", db_uri)
        .env("PGRST_DB_SCHEMAS", "public")
        .env("PGRST_DB_ANON_ROLE", "anon")
        .env("PGRST_JWT_SECRET", POSTGREST_JWT_SECRET)
        .env("PGRST_SERVER_PORT", s.postgrest_port.to_string())
        .publish(s.postgrest_port)
    }

    fn images(&self) -> Vec<&str> {
        let images = &self.settings.images;
        let mut list = vec![images.postgres.as_str()];
        if self.options.stack {
            list.push(images.pgbouncer.as_str());
            list.push(images.postgrest.as_str());
        }
        list
    }

    /// Names of the checks that need a ready database.
    fn dependent_check_names(&self) -> Vec<String> {
        let mut names: Vec<String> = SQL_CHECK_NAMES.iter().map(|n| n.to_string()).collect();
        names.extend(
            self.expectations
                .database
                .loadable_extensions
                .iter()
                .map(|ext| format!("extension {} loads", ext)),
        );
        names.extend(CREDENTIAL_CHECK_NAMES.iter().map(|n| n.to_string()));
        if self.options.stack {
            names.push(PGBOUNCER_CHECK.to_string());
            names.push(POSTGREST_CHECK.to_string());
        }
        names
    }

    fn provision(
        &self,
        docker: &DockerCli<'_>,
        workdir: &WorkDir,
        checklist: &mut Checklist,
        on_progress: &mut dyn FnMut(RunProgress<'_>),
    ) -> Option<Endpoints> {
        if self.options.skip_pull {
            on_progress(RunProgress::Note("Skipping image pull"));
        } else {
            for image in self.images() {
                on_progress(RunProgress::Action(&format!("Pulling {}", image)));
                // A failed pull falls back to a locally cached image; a
                // missing image then fails the container start instead.
                let outcome = match docker.pull(image) {
                    Ok(()) => CheckOutcome::Passed,
                    Err(e) => {
                        on_progress(RunProgress::Warning(&format!(
                            "Pull of {} failed, using cached image: {}",
                            image, e
                        )));
                        CheckOutcome::skipped(format!("pull failed: {}", e))
                    }
                };
                checklist.record(CheckResult::new(format!("image {} pulled", image), outcome));
            }
        }

        let network = self.run_id.network_name();
        if checklist
            .run("run network created", || docker.create_network(&network).into())
            .is_failure()
        {
            return None;
        }

        let spec = self.postgres_spec();
        if !self.start_container(docker, &spec, checklist) {
            return None;
        }
        let port = match docker.host_port(&spec.name, POSTGRES_CONTAINER_PORT) {
            Ok(port) => port,
            Err(e) => {
                checklist.record(CheckResult::new(
                    "postgres port published",
                    CheckOutcome::failed(e.to_string()),
                ));
                return None;
            }
        };
        let target = ConnectionTarget::from_settings(self.settings)
            .with_host(PUBLISHED_HOST)
            .with_port(port);
        on_progress(RunProgress::Action(&format!(
            "Waiting for PostgreSQL on {}",
            target.endpoint()
        )));

        let ready = checklist.run("container ready", || {
            wait_for_postgres(self.db, &target, &self.options.readiness).into()
        });
        if ready.is_failure() {
            self.save_logs(docker, workdir, &spec.name, on_progress);
            return None;
        }

        let mut endpoints = Endpoints {
            postgres: target.clone(),
            pgbouncer: None,
            postgrest_url: None,
        };

        if self.options.stack {
            let pgbouncer = self.pgbouncer_spec();
            if self.start_container(docker, &pgbouncer, checklist) {
                endpoints.pgbouncer = self
                    .published_port(docker, &pgbouncer, self.settings.pgbouncer_port, checklist)
                    .map(|port| target.clone().with_port(port));
            }
            let postgrest = self.postgrest_spec();
            if self.start_container(docker, &postgrest, checklist) {
                endpoints.postgrest_url = self
                    .published_port(docker, &postgrest, self.settings.postgrest_port, checklist)
                    .map(|port| format!("http://{}:{}/", PUBLISHED_HOST, port));
            }
        }

        Some(endpoints)
    }

    fn start_container(
        &self,
        docker: &DockerCli<'_>,
        spec: &ContainerSpec,
        checklist: &mut Checklist,
    ) -> bool {
        let role = spec
            .name
            .strip_prefix(&self.run_id.prefix())
            .unwrap_or(spec.name.as_str());
        !checklist
            .run(format!("{} container started", role), || {
                docker.run_container(spec).map(|_| ()).into()
            })
            .is_failure()
    }

    fn published_port(
        &self,
        docker: &DockerCli<'_>,
        spec: &ContainerSpec,
        container_port: u16,
        checklist: &mut Checklist,
    ) -> Option<u16> {
        match docker.host_port(&spec.name, container_port) {
            Ok(port) => Some(port),
            Err(e) => {
                checklist.record(CheckResult::new(
                    format!("{} port published", spec.name),
                    CheckOutcome::failed(e.to_string()),
                ));
                None
            }
        }
    }

    fn save_logs(
        &self,
        docker: &DockerCli<'_>,
        workdir: &WorkDir,
        container: &str,
        on_progress: &mut dyn FnMut(RunProgress<'_>),
    ) {
        let logs = match docker.logs(container, self.options.log_tail) {
            Ok(logs) => logs,
            Err(e) => {
                on_progress(RunProgress::Warning(&format!(
                    "Could not read logs of {}: {}",
                    container, e
                )));
                return;
            }
        };
        match workdir.write(&format!("{}.log", container), &logs) {
            Ok(path) => tracing::debug!("Saved logs of {} to {}", container, path.display()),
            Err(e) => tracing::warn!("Could not save logs of {}: {}", container, e),
        }
        on_progress(RunProgress::Detail {
            title: "container log",
            text: &logs,
        });
    }

    fn check(&self, endpoints: &Endpoints, checklist: &mut Checklist) {
        let ctx = SqlContext {
            db: self.db,
            target: &endpoints.postgres,
            expectations: &self.expectations.database,
        };
        sql::run_sql_checks(checklist, &ctx);
        sql::run_credential_checks(
            checklist,
            self.db,
            &endpoints.postgres,
            self.settings.wrong_password(),
        );

        if !self.options.stack {
            return;
        }
        let policy = &self.options.stack_readiness;
        checklist.run(PGBOUNCER_CHECK, || match &endpoints.pgbouncer {
            Some(target) => match wait_for_postgres(self.db, target, policy) {
                Ok(()) => sql::check_select_one(self.db, target),
                Err(e) => CheckOutcome::failed(e.to_string()),
            },
            None => CheckOutcome::failed("pgbouncer is not running"),
        });
        checklist.run(POSTGREST_CHECK, || match &endpoints.postgrest_url {
            Some(url) => wait_for_http(url, policy).into(),
            None => CheckOutcome::failed("PostgREST is not running"),
        });
    }
}

impl Runner for DockerRunner<'_> {
    fn kind(&self) -> RunnerKind {
        RunnerKind::Docker
    }

    fn run(&mut self, on_progress: &mut dyn FnMut(RunProgress<'_>)) -> Result<RunReport> {
        let docker = DockerCli::new(self.commands);
        docker.ensure_available()?;

        let started_at = Utc::now();
        let start = Instant::now();
        let mut phases = PhaseTracker::new();
        let mut checklist = Checklist::new();
        let mut seen = 0;

        phases.advance(RunPhase::Provisioning)?;
        on_progress(RunProgress::Phase(RunPhase::Provisioning));
        let workdir = match &self.temp_root {
            Some(root) => WorkDir::create_in(RunnerKind::Docker, root)?,
            None => WorkDir::create(RunnerKind::Docker)?,
        };
        let guard = ContainerGuard::new(DockerCli::new(self.commands), self.run_id.prefix());
        tracing::debug!("Run {} using {}", self.run_id, workdir.path().display());

        let endpoints = self.provision(&docker, &workdir, &mut checklist, on_progress);
        emit_new_checks(&checklist, &mut seen, on_progress);

        match endpoints {
            Some(endpoints) => {
                phases.advance(RunPhase::Checking)?;
                on_progress(RunProgress::Phase(RunPhase::Checking));
                self.check(&endpoints, &mut checklist);
            }
            None => {
                let names = self.dependent_check_names();
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                checklist.skip_all(&names, "database not ready");
            }
        }
        emit_new_checks(&checklist, &mut seen, on_progress);

        phases.advance(RunPhase::TearingDown)?;
        on_progress(RunProgress::Phase(RunPhase::TearingDown));
        let mut teardown = guard.teardown();
        if let Err(e) = workdir.close() {
            teardown
                .errors
                .push(format!("failed to remove working directory: {}", e));
        }
        for error in &teardown.errors {
            on_progress(RunProgress::Warning(error));
        }

        phases.advance(RunPhase::Done)?;
        on_progress(RunProgress::Phase(RunPhase::Done));

        Ok(RunReport::finish(
            RunnerKind::Docker,
            started_at,
            start,
            phases,
            checklist,
            Some(teardown),
        ))
    }
}

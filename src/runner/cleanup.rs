//! Removal of resources left behind by interrupted runs.
//!
//! Everything is found by name prefix alone (see [`crate::docker::naming`]),
//! so the utility is safe to run at any time and as often as needed.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::docker::naming::{LEGACY_CONTAINER_PREFIXES, LEGACY_NETWORK_PREFIXES, RESOURCE_PREFIX};
use crate::docker::{is_test_workdir, DockerCli};
use crate::shell::CommandRunner;

use super::guard::sweep;

/// What to clean and where.
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// List what would be removed without removing it.
    pub dry_run: bool,
    /// Directory searched for leftover working directories.
    pub temp_root: PathBuf,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            temp_root: std::env::temp_dir(),
        }
    }
}

/// Everything the cleanup removed (or would remove, in a dry run).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupSummary {
    pub dry_run: bool,
    pub containers: Vec<String>,
    pub networks: Vec<String>,
    pub directories: Vec<PathBuf>,
    /// Why container cleanup did not happen, if it did not.
    pub docker_skipped: Option<String>,
    pub errors: Vec<String>,
}

impl CleanupSummary {
    pub fn total(&self) -> usize {
        self.containers.len() + self.networks.len() + self.directories.len()
    }
}

/// Remove every pgcompat container, network and working directory.
///
/// Never fails: problems are collected in [`CleanupSummary::errors`].
pub fn cleanup(runner: &dyn CommandRunner, options: &CleanupOptions) -> CleanupSummary {
    let mut summary = CleanupSummary {
        dry_run: options.dry_run,
        ..CleanupSummary::default()
    };

    let docker = DockerCli::new(runner);
    match docker.ensure_available() {
        Ok(()) => {
            let container_prefixes: Vec<&str> = std::iter::once(RESOURCE_PREFIX)
                .chain(LEGACY_CONTAINER_PREFIXES.iter().copied())
                .collect();
            let network_prefixes: Vec<&str> = std::iter::once(RESOURCE_PREFIX)
                .chain(LEGACY_NETWORK_PREFIXES.iter().copied())
                .collect();
            let teardown = sweep(&docker, &container_prefixes, &network_prefixes, options.dry_run);
            summary.containers = teardown.containers_removed;
            summary.networks = teardown.networks_removed;
            summary.errors.extend(teardown.errors);
        }
        Err(e) => {
            tracing::debug!("Skipping container cleanup: {}", e);
            summary.docker_skipped = Some(e.to_string());
        }
    }

    remove_workdirs(&options.temp_root, options.dry_run, &mut summary);
    summary
}

fn remove_workdirs(root: &Path, dry_run: bool, summary: &mut CleanupSummary) {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            summary
                .errors
                .push(format!("cannot read {}: {}", root.display(), e));
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir || !is_test_workdir(name) {
            continue;
        }

        let path = entry.path();
        if dry_run {
            summary.directories.push(path);
            continue;
        }
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::debug!("Removed {}", path.display());
                summary.directories.push(path);
            }
            Err(e) => {
                let message = format!("failed to remove {}: {}", path.display(), e);
                tracing::warn!("{}", message);
                summary.errors.push(message);
            }
        }
    }
    summary.directories.sort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::MockRunner;

    fn options(root: &Path, dry_run: bool) -> CleanupOptions {
        CleanupOptions {
            dry_run,
            temp_root: root.to_path_buf(),
        }
    }

    fn populate(root: &Path) {
        std::fs::create_dir(root.join("pgcompat-docker-abc123")).unwrap();
        std::fs::write(root.join("pgcompat-docker-abc123").join("postgres.log"), "x").unwrap();
        std::fs::create_dir(root.join("pgcompat-ami-def456")).unwrap();
        std::fs::create_dir(root.join("unrelated")).unwrap();
        std::fs::write(root.join("pgcompat-not-a-dir"), "keep me").unwrap();
    }

    #[test]
    fn without_docker_only_directories_are_removed() {
        let temp = tempfile::tempdir().unwrap();
        populate(temp.path());

        let summary = cleanup(&MockRunner::new(), &options(temp.path(), false));

        assert!(summary.docker_skipped.is_some());
        assert_eq!(summary.directories.len(), 2);
        assert!(summary.errors.is_empty());
        assert!(!temp.path().join("pgcompat-docker-abc123").exists());
        assert!(!temp.path().join("pgcompat-ami-def456").exists());
        assert!(temp.path().join("unrelated").exists());
        assert!(temp.path().join("pgcompat-not-a-dir").exists());
    }

    #[test]
    fn dry_run_keeps_everything() {
        let temp = tempfile::tempdir().unwrap();
        populate(temp.path());

        let summary = cleanup(&MockRunner::new(), &options(temp.path(), true));

        assert_eq!(summary.directories.len(), 2);
        assert!(temp.path().join("pgcompat-docker-abc123").exists());
    }

    #[test]
    fn second_run_finds_nothing() {
        let temp = tempfile::tempdir().unwrap();
        populate(temp.path());
        let runner = MockRunner::new();

        cleanup(&runner, &options(temp.path(), false));
        let again = cleanup(&runner, &options(temp.path(), false));
        assert_eq!(again.total(), 0);
        assert!(again.errors.is_empty());
    }

    #[test]
    fn removes_current_and_legacy_docker_resources() {
        let temp = tempfile::tempdir().unwrap();
        let runner = MockRunner::new();
        runner.respond_ok("docker --version", "Docker version 27.1.1\n");
        runner.respond_ok("docker info --format {{.ServerVersion}}", "27.1.1\n");
        runner.respond_ok(
            "docker ps -a --filter name=pgcompat_ --format {{.Names}}",
            "pgcompat_1_postgres\n",
        );
        runner.respond_ok(
            "docker ps -a --filter name=test_postgres_ --format {{.Names}}",
            "test_postgres_15_1718000000\nmy_test_postgres_keep\n",
        );
        runner.respond_ok("docker network ls --filter name=pgcompat_ --format {{.Name}}", "");
        runner.respond_ok(
            "docker network ls --filter name=supabase_test_ --format {{.Name}}",
            "supabase_test_1718000000\n",
        );
        runner.respond_ok("docker rm -f -v pgcompat_1_postgres", "");
        runner.respond_ok("docker rm -f -v test_postgres_15_1718000000", "");
        runner.respond_ok("docker network rm supabase_test_1718000000", "");

        let summary = cleanup(&runner, &options(temp.path(), false));

        assert_eq!(
            summary.containers,
            vec!["pgcompat_1_postgres", "test_postgres_15_1718000000"]
        );
        assert_eq!(summary.networks, vec!["supabase_test_1718000000"]);
        assert!(summary.docker_skipped.is_none());
        assert!(!runner.was_called("docker rm -f -v my_test_postgres_keep"));
    }

    #[test]
    fn missing_temp_root_is_reported_not_fatal() {
        let temp = tempfile::tempdir().unwrap();
        let summary = cleanup(&MockRunner::new(), &options(&temp.path().join("gone"), false));
        assert_eq!(summary.errors.len(), 1);
    }
}

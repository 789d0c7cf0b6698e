//! Container teardown guard.

use serde::Serialize;

use crate::docker::DockerCli;

/// What a teardown removed and what it could not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Teardown {
    pub containers_removed: Vec<String>,
    pub networks_removed: Vec<String>,
    pub errors: Vec<String>,
}

impl Teardown {
    /// True when nothing went wrong.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of resources removed.
    pub fn removed(&self) -> usize {
        self.containers_removed.len() + self.networks_removed.len()
    }
}

/// Remove every container whose name starts with one of `prefixes` and
/// every network whose name starts with one of `network_prefixes`.
///
/// Containers go first because a network cannot be removed while attached.
/// Errors are collected, never returned: teardown is best-effort.
pub fn sweep(
    docker: &DockerCli<'_>,
    prefixes: &[&str],
    network_prefixes: &[&str],
    dry_run: bool,
) -> Teardown {
    let mut teardown = Teardown::default();

    for prefix in prefixes {
        match docker.list_containers(prefix) {
            Ok(names) => {
                for name in names {
                    if dry_run {
                        teardown.containers_removed.push(name);
                        continue;
                    }
                    match docker.remove_container(&name) {
                        Ok(()) => teardown.containers_removed.push(name),
                        Err(e) => teardown
                            .errors
                            .push(format!("failed to remove container {}: {}", name, e)),
                    }
                }
            }
            Err(e) => teardown
                .errors
                .push(format!("failed to list containers '{}*': {}", prefix, e)),
        }
    }

    for prefix in network_prefixes {
        match docker.list_networks(prefix) {
            Ok(names) => {
                for name in names {
                    if dry_run {
                        teardown.networks_removed.push(name);
                        continue;
                    }
                    match docker.remove_network(&name) {
                        Ok(()) => teardown.networks_removed.push(name),
                        Err(e) => teardown
                            .errors
                            .push(format!("failed to remove network {}: {}", name, e)),
                    }
                }
            }
            Err(e) => teardown
                .errors
                .push(format!("failed to list networks '{}*': {}", prefix, e)),
        }
    }

    for error in &teardown.errors {
        tracing::warn!("{}", error);
    }
    teardown
}

/// Tears down every container and network of one run.
///
/// Call [`teardown`](Self::teardown) on the normal path to get a
/// [`Teardown`] record; if the guard is dropped first (early return or
/// panic) the same sweep runs from `Drop` and only logs.
pub struct ContainerGuard<'a> {
    docker: DockerCli<'a>,
    prefix: String,
    done: bool,
}

impl<'a> ContainerGuard<'a> {
    /// Guard all resources whose name starts with `prefix`.
    pub fn new(docker: DockerCli<'a>, prefix: impl Into<String>) -> Self {
        Self {
            docker,
            prefix: prefix.into(),
            done: false,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Remove the run's resources now.
    pub fn teardown(mut self) -> Teardown {
        self.done = true;
        self.sweep()
    }

    fn sweep(&self) -> Teardown {
        let prefix = self.prefix.as_str();
        sweep(&self.docker, &[prefix], &[prefix], false)
    }
}

impl Drop for ContainerGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        tracing::debug!("Tearing down {}* from drop guard", self.prefix);
        let teardown = self.sweep();
        if !teardown.is_clean() {
            tracing::warn!(
                "Teardown of {}* left {} error(s); run `pgcompat cleanup-tests`",
                self.prefix,
                teardown.errors.len()
            );
        }
    }
}

//! Container runtime access through the `docker` command line.

use crate::error::{CompatError, Result};
use crate::shell::{display_command, CommandRunner};

/// A container to start in detached mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<(String, String)>,
    /// Container ports published on ephemeral host ports.
    pub publish: Vec<u16>,
    pub network: Option<String>,
}

impl ContainerSpec {
    /// A spec with no environment, ports or network.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            env: Vec::new(),
            publish: Vec::new(),
            network: None,
        }
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Add several environment variables.
    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    /// Publish a container port on an ephemeral host port.
    pub fn publish(mut self, port: u16) -> Self {
        self.publish.push(port);
        self
    }

    /// Attach to a network.
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Arguments for `docker`.
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
        ];
        if let Some(network) = &self.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        for port in &self.publish {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(self.image.clone());
        args
    }
}

/// Thin wrapper over the `docker` CLI.
pub struct DockerCli<'a> {
    runner: &'a dyn CommandRunner,
    binary: String,
}

impl<'a> DockerCli<'a> {
    /// Use `docker` from `PATH`.
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            binary: "docker".to_string(),
        }
    }

    /// Name of the runtime binary.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let result = self.runner.run_checked(&self.binary, args)?;
        Ok(result.stdout_trimmed().to_string())
    }

    /// Client version, or `None` when docker is not installed.
    pub fn client_version(&self) -> Option<String> {
        self.runner.stdout_of(&self.binary, &["--version"])
    }

    /// Server version, or `None` when the daemon is unreachable.
    pub fn server_version(&self) -> Option<String> {
        self.runner
            .stdout_of(&self.binary, &["info", "--format", "{{.ServerVersion}}"])
            .filter(|v| !v.is_empty())
    }

    /// Fail unless docker is installed and its daemon answers.
    pub fn ensure_available(&self) -> Result<()> {
        if self.client_version().is_none() {
            return Err(CompatError::RuntimeUnavailable {
                runtime: self.binary.clone(),
                message: "docker is not installed or not on PATH".to_string(),
            });
        }
        if self.server_version().is_none() {
            return Err(CompatError::RuntimeUnavailable {
                runtime: self.binary.clone(),
                message: "the docker daemon is not reachable (is it running?)".to_string(),
            });
        }
        Ok(())
    }

    /// Whether docker is installed and its daemon answers.
    pub fn is_available(&self) -> bool {
        self.ensure_available().is_ok()
    }

    /// Pull an image.
    pub fn pull(&self, image: &str) -> Result<()> {
        self.run(&["pull", image]).map(|_| ())
    }

    /// Start a detached container, returning its id.
    pub fn run_container(&self, spec: &ContainerSpec) -> Result<String> {
        let args = spec.run_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&args)
    }

    /// Host port that `container_port/tcp` is published on.
    pub fn host_port(&self, container: &str, container_port: u16) -> Result<u16> {
        let mapping = format!("{}/tcp", container_port);
        let output = self.run(&["port", container, &mapping])?;
        parse_host_port(&output).ok_or_else(|| {
            CompatError::Other(anyhow::anyhow!(
                "no host port published for {} {}: '{}'",
                container,
                mapping,
                output
            ))
        })
    }

    /// Last lines of a container's log (stdout and stderr interleaved).
    pub fn logs(&self, container: &str, tail: usize) -> Result<String> {
        let tail = tail.to_string();
        let args = ["logs", "--tail", tail.as_str(), container];
        let result = self.runner.run(&self.binary, &args)?;
        let command = display_command(&self.binary, &args);
        let result = result.into_checked(&command)?;
        Ok(format!("{}{}", result.stdout, result.stderr))
    }

    /// Names of all containers (running or not) whose name starts with `prefix`.
    ///
    /// Docker's `name` filter matches substrings; the prefix is enforced here.
    pub fn list_containers(&self, prefix: &str) -> Result<Vec<String>> {
        let filter = format!("name={}", prefix);
        let output = self.run(&["ps", "-a", "--filter", &filter, "--format", "{{.Names}}"])?;
        Ok(names_with_prefix(&output, prefix))
    }

    /// Force-remove a container.
    pub fn remove_container(&self, name: &str) -> Result<()> {
        self.run(&["rm", "-f", "-v", name]).map(|_| ())
    }

    /// Create a bridge network.
    pub fn create_network(&self, name: &str) -> Result<()> {
        self.run(&["network", "create", name]).map(|_| ())
    }

    /// Names of all networks whose name starts with `prefix`.
    pub fn list_networks(&self, prefix: &str) -> Result<Vec<String>> {
        let filter = format!("name={}", prefix);
        let output = self.run(&["network", "ls", "--filter", &filter, "--format", "{{.Name}}"])?;
        Ok(names_with_prefix(&output, prefix))
    }

    /// Remove a network.
    pub fn remove_network(&self, name: &str) -> Result<()> {
        self.run(&["network", "rm", name]).map(|_| ())
    }
}

/// Parse the first mapping printed by `docker port`, e.g. `0.0.0.0:49153`.
pub fn parse_host_port(output: &str) -> Option<u16> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    line.rsplit(':').next()?.parse().ok()
}

fn names_with_prefix(output: &str, prefix: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty() && name.starts_with(prefix))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{CommandResult, MockRunner};

    fn available_runner() -> MockRunner {
        let runner = MockRunner::new();
        runner.respond_ok("docker --version", "Docker version 27.1.1, build 6312585\n");
        runner.respond_ok("docker info --format {{.ServerVersion}}", "27.1.1\n");
        runner
    }

    #[test]
    fn run_args_are_ordered() {
        let spec = ContainerSpec::new("pgcompat_1_postgres", "postgres:16")
            .network("pgcompat_1_net")
            .env("POSTGRES_PASSWORD", "secret")
            .publish(5432);
        insta::assert_snapshot!(
            spec.run_args().join(" "),
            @"run -d --name pgcompat_1_postgres --network pgcompat_1_net -e POSTGRES_PASSWORD=secret -p 5432 postgres:16"
        );
    }

    #[test]
    fn ensure_available_when_installed_and_running() {
        let runner = available_runner();
        let docker = DockerCli::new(&runner);
        assert!(docker.ensure_available().is_ok());
    }

    #[test]
    fn ensure_available_fails_when_not_installed() {
        let runner = MockRunner::new();
        let docker = DockerCli::new(&runner);
        let err = docker.ensure_available().unwrap_err();
        assert!(err.to_string().contains("not installed"));
        assert!(!runner.was_called_with_prefix("docker info"));
    }

    #[test]
    fn ensure_available_fails_when_daemon_down() {
        let runner = MockRunner::new();
        runner.respond_ok("docker --version", "Docker version 27.1.1\n");
        runner.respond(
            "docker info --format {{.ServerVersion}}",
            CommandResult::failure(Some(1), "Cannot connect to the Docker daemon"),
        );
        let docker = DockerCli::new(&runner);
        let err = docker.ensure_available().unwrap_err();
        assert!(err.to_string().contains("daemon is not reachable"));
    }

    #[test]
    fn host_port_parses_first_mapping() {
        let runner = available_runner();
        runner.respond_ok("docker port c1 5432/tcp", "0.0.0.0:49153\n[::]:49153\n");
        let docker = DockerCli::new(&runner);
        assert_eq!(docker.host_port("c1", 5432).unwrap(), 49153);
    }

    #[test]
    fn host_port_errors_without_mapping() {
        let runner = available_runner();
        runner.respond_ok("docker port c1 5432/tcp", "");
        let docker = DockerCli::new(&runner);
        assert!(docker.host_port("c1", 5432).is_err());
    }

    #[test]
    fn list_containers_enforces_prefix() {
        let runner = available_runner();
        runner.respond_ok(
            "docker ps -a --filter name=pgcompat_ --format {{.Names}}",
            "pgcompat_1_postgres\nprod_pgcompat_db\npgcompat_1_pgbouncer\n",
        );
        let docker = DockerCli::new(&runner);
        assert_eq!(
            docker.list_containers("pgcompat_").unwrap(),
            vec!["pgcompat_1_postgres", "pgcompat_1_pgbouncer"]
        );
    }

    #[test]
    fn pull_failure_is_command_failed() {
        let runner = available_runner();
        runner.respond(
            "docker pull nope:latest",
            CommandResult::failure(Some(1), "manifest unknown"),
        );
        let docker = DockerCli::new(&runner);
        let err = docker.pull("nope:latest").unwrap_err();
        assert!(matches!(err, CompatError::CommandFailed { ref stderr, .. } if stderr == "manifest unknown"));
    }

    #[test]
    fn parse_host_port_variants() {
        assert_eq!(parse_host_port("0.0.0.0:32768"), Some(32768));
        assert_eq!(parse_host_port("\n[::]:32769\n"), Some(32769));
        assert_eq!(parse_host_port("garbage"), None);
        assert_eq!(parse_host_port(""), None);
    }
}

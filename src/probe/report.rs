//! Read-only snapshot of the host.
//!
//! Every field is filled from one command or file. A field that cannot be
//! read gets a placeholder instead of an error, so collecting a report
//! never fails.

use serde::Serialize;

use crate::docker::DockerCli;
use crate::shell::CommandRunner;

use super::OsRelease;

pub const UNKNOWN: &str = "Unknown";
pub const NOT_INSTALLED: &str = "Not installed";
pub const UNAVAILABLE: &str = "Unavailable";

/// Diagnostic facts about the current host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemReport {
    pub os: String,
    pub os_version: String,
    pub kernel: String,
    pub architecture: String,
    pub systemd: String,
    pub glibc: String,
    pub openssl: String,
    pub python: String,
    pub docker: String,
    pub docker_daemon: String,
    pub psql: String,
    pub postgresql_service: String,
    pub addresses: String,
    pub disk: String,
    pub memory: String,
}

/// A titled group of report lines.
pub struct ReportSection {
    pub title: &'static str,
    pub rows: Vec<(&'static str, String)>,
}

impl SystemReport {
    /// Probe the host.
    pub fn collect(runner: &dyn CommandRunner, release: Option<&OsRelease>) -> Self {
        let first_line = |program: &str, args: &[&str], missing: &str| {
            runner
                .stdout_of(program, args)
                .and_then(|out| out.lines().next().map(str::to_string))
                .filter(|line| !line.is_empty())
                .unwrap_or_else(|| missing.to_string())
        };

        let docker = DockerCli::new(runner);
        let (docker_client, docker_daemon) = match docker.client_version() {
            None => (NOT_INSTALLED.to_string(), NOT_INSTALLED.to_string()),
            Some(client) => {
                let daemon = match docker.server_version() {
                    Some(server) => format!("Running (server {})", server),
                    None => "Not running".to_string(),
                };
                (client, daemon)
            }
        };

        let postgresql_service = match runner.run("systemctl", &["is-active", "postgresql"]) {
            Ok(result) if !result.stdout_trimmed().is_empty() => {
                result.stdout_trimmed().to_string()
            }
            _ => UNAVAILABLE.to_string(),
        };

        Self {
            os: release
                .and_then(OsRelease::pretty_name)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            os_version: release
                .and_then(OsRelease::version_id)
                .unwrap_or(UNKNOWN)
                .to_string(),
            kernel: first_line("uname", &["-r"], UNKNOWN),
            architecture: first_line("uname", &["-m"], UNKNOWN),
            systemd: first_line("systemctl", &["--version"], NOT_INSTALLED),
            glibc: first_line("ldd", &["--version"], UNKNOWN),
            openssl: first_line("openssl", &["version"], NOT_INSTALLED),
            python: first_line("python3", &["--version"], NOT_INSTALLED),
            docker: docker_client,
            docker_daemon,
            psql: first_line("psql", &["--version"], NOT_INSTALLED),
            postgresql_service,
            addresses: first_line("hostname", &["-I"], UNAVAILABLE),
            disk: runner
                .stdout_of("df", &["-h", "/"])
                .and_then(|out| parse_df_root(&out))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
            memory: runner
                .stdout_of("free", &["-h"])
                .and_then(|out| parse_free_mem(&out))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
        }
    }

    /// Report grouped for display.
    pub fn sections(&self) -> Vec<ReportSection> {
        vec![
            ReportSection {
                title: "System",
                rows: vec![
                    ("OS", self.os.clone()),
                    ("Version", self.os_version.clone()),
                    ("Kernel", self.kernel.clone()),
                    ("Architecture", self.architecture.clone()),
                ],
            },
            ReportSection {
                title: "Tools",
                rows: vec![
                    ("systemd", self.systemd.clone()),
                    ("glibc", self.glibc.clone()),
                    ("OpenSSL", self.openssl.clone()),
                    ("Python", self.python.clone()),
                ],
            },
            ReportSection {
                title: "Database",
                rows: vec![
                    ("Docker", self.docker.clone()),
                    ("Docker daemon", self.docker_daemon.clone()),
                    ("psql", self.psql.clone()),
                    ("postgresql service", self.postgresql_service.clone()),
                ],
            },
            ReportSection {
                title: "Resources",
                rows: vec![
                    ("Addresses", self.addresses.clone()),
                    ("Disk (/)", self.disk.clone()),
                    ("Memory", self.memory.clone()),
                ],
            },
        ]
    }
}

/// Summarise `df -h /` as `used/size (use%)`.
pub fn parse_df_root(output: &str) -> Option<String> {
    let line = output.lines().nth(1)?;
    let cols: Vec<&str> = line.split_whitespace().collect();
    match cols.as_slice() {
        [_, size, used, _avail, pct, ..] => Some(format!("{}/{} used ({})", used, size, pct)),
        _ => None,
    }
}

/// Summarise the `Mem:` line of `free -h` as `used/total`.
pub fn parse_free_mem(output: &str) -> Option<String> {
    let line = output.lines().find(|l| l.trim_start().starts_with("Mem:"))?;
    let cols: Vec<&str> = line.split_whitespace().collect();
    match cols.as_slice() {
        [_, total, used, ..] => Some(format!("{}/{} used", used, total)),
        _ => None,
    }
}

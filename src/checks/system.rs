//! Operating system and system library checks.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::OsExpectations;
use crate::probe::OsRelease;
use crate::shell::CommandRunner;

use super::{CheckOutcome, Checklist};

/// Run every system check against the current host.
pub fn run_system_checks(
    checklist: &mut Checklist,
    runner: &dyn CommandRunner,
    release: Option<&OsRelease>,
    exp: &OsExpectations,
) {
    checklist.run("operating system release", || check_os_release(release, exp));
    checklist.run("kernel version", || check_kernel(runner, exp.min_kernel_major));
    checklist.run("systemd version", || check_systemd(runner, exp.min_systemd));
    checklist.run("glibc version", || check_glibc(runner, &exp.glibc_markers));
    checklist.run("OpenSSL version", || {
        check_tool_version(runner, "openssl", &["version"], &exp.openssl_marker, false)
    });
    checklist.run("Python version", || {
        check_tool_version(runner, "python3", &["--version"], &exp.python_marker, false)
    });
    checklist.run("NetworkManager version", || {
        check_tool_version(runner, "nmcli", &["--version"], &exp.network_manager_marker, true)
    });
    checklist.run("APT version", || {
        check_tool_version(runner, "apt", &["--version"], &exp.apt_marker, true)
    });
}

pub fn check_os_release(release: Option<&OsRelease>, exp: &OsExpectations) -> CheckOutcome {
    let Some(release) = release else {
        return CheckOutcome::failed("cannot read /etc/os-release");
    };
    let id = release.id().unwrap_or("");
    if id != exp.id {
        return CheckOutcome::failed(format!("expected {}, got '{}'", exp.id, id));
    }
    let Some(version) = release.version_id() else {
        return CheckOutcome::failed("VERSION_ID missing from os-release");
    };
    if !version.starts_with(&exp.version_prefix) {
        return CheckOutcome::failed(format!(
            "expected {} {}, got {}",
            exp.id, exp.version_prefix, version
        ));
    }
    if exp.require_lts && !release.version().unwrap_or("").contains("LTS") {
        return CheckOutcome::failed(format!("{} {} is not an LTS release", exp.id, version));
    }
    CheckOutcome::Passed
}

static KERNEL_MAJOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\.").expect("KERNEL_MAJOR_REGEX must compile"));

static SYSTEMD_VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*systemd\s+(\d+)").expect("SYSTEMD_VERSION_REGEX must compile")
});

/// Leading integer of a kernel release such as `6.8.0-1012-aws`.
pub fn parse_kernel_major(release: &str) -> Option<u32> {
    capture_number(&KERNEL_MAJOR_REGEX, release)
}

/// Version number from the first line of `systemctl --version`.
pub fn parse_systemd_version(output: &str) -> Option<u32> {
    capture_number(&SYSTEMD_VERSION_REGEX, output.lines().next()?)
}

fn capture_number(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

pub fn check_kernel(runner: &dyn CommandRunner, min_major: u32) -> CheckOutcome {
    let Some(release) = runner.stdout_of("uname", &["-r"]) else {
        return CheckOutcome::failed("cannot run uname -r");
    };
    match parse_kernel_major(&release) {
        Some(major) => CheckOutcome::expect(major >= min_major, || {
            format!("expected kernel {}.x or newer, got {}", min_major, release)
        }),
        None => CheckOutcome::failed(format!("unrecognised kernel release '{}'", release)),
    }
}

pub fn check_systemd(runner: &dyn CommandRunner, min_version: u32) -> CheckOutcome {
    let Some(output) = runner.stdout_of("systemctl", &["--version"]) else {
        return CheckOutcome::failed("systemctl not available");
    };
    match parse_systemd_version(&output) {
        Some(version) => CheckOutcome::expect(version >= min_version, || {
            format!("expected systemd >= {}, got {}", min_version, version)
        }),
        None => CheckOutcome::failed(format!(
            "unrecognised systemctl output '{}'",
            output.lines().next().unwrap_or("")
        )),
    }
}

pub fn check_glibc(runner: &dyn CommandRunner, markers: &[String]) -> CheckOutcome {
    let Some(output) = runner.stdout_of("ldd", &["--version"]) else {
        return CheckOutcome::skipped("ldd not available");
    };
    let first_line = output.lines().next().unwrap_or("");
    CheckOutcome::expect(markers.iter().any(|m| first_line.contains(m.as_str())), || {
        format!("unexpected glibc version info: {}", first_line)
    })
}

/// Check that a tool's version output mentions `marker`.
///
/// Output on stderr is considered too, some tools print their version there.
/// When `optional` is set a missing tool skips instead of failing.
pub fn check_tool_version(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
    marker: &str,
    optional: bool,
) -> CheckOutcome {
    match runner.run(program, args) {
        Ok(result) if result.success => {
            let output = format!("{}{}", result.stdout, result.stderr);
            let version = output.trim();
            CheckOutcome::expect(version.contains(marker), || {
                format!("expected {} {}, got '{}'", program, marker, version)
            })
        }
        Ok(result) => CheckOutcome::failed(format!(
            "{} exited with {:?}: {}",
            program,
            result.exit_code,
            result.stderr.trim()
        )),
        Err(_) if optional => CheckOutcome::skipped(format!("{} not installed", program)),
        Err(_) => CheckOutcome::failed(format!("{} not available", program)),
    }
}

//! systemd unit checks for hosts running the full Supabase stack.

use std::collections::BTreeMap;

use crate::config::ServiceExpectations;
use crate::shell::CommandRunner;

use super::{CheckOutcome, Checklist};

/// Properties printed by `systemctl show <unit>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitProperties(BTreeMap<String, String>);

impl UnitProperties {
    /// Parse `Key=value` lines.
    pub fn parse(output: &str) -> Self {
        Self(
            output
                .lines()
                .filter_map(|line| line.split_once('='))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn active_state(&self) -> Option<&str> {
        self.get("ActiveState")
    }

    /// Current memory use in bytes, `None` when accounting is off.
    pub fn memory_current(&self) -> Option<u64> {
        self.get("MemoryCurrent").and_then(|v| v.parse().ok())
    }

    /// Whether `option` (a `Key=value` pair) is set exactly.
    pub fn has_option(&self, option: &str) -> bool {
        match option.split_once('=') {
            Some((key, value)) => self.get(key) == Some(value),
            None => self.0.contains_key(option),
        }
    }
}

/// Read a unit's properties, `None` when systemctl cannot be run.
pub fn unit_properties(runner: &dyn CommandRunner, unit: &str) -> Option<UnitProperties> {
    runner
        .stdout_of("systemctl", &["show", unit])
        .map(|output| UnitProperties::parse(&output))
}

/// Whether `systemctl is-active` reports the unit active.
///
/// `is-active` exits non-zero for inactive units; only stdout matters.
pub fn is_active(runner: &dyn CommandRunner, unit: &str) -> bool {
    runner
        .run("systemctl", &["is-active", unit])
        .map(|r| r.stdout_trimmed() == "active")
        .unwrap_or(false)
}

/// Error-priority journal entries for a unit within the last hour.
pub fn recent_errors(runner: &dyn CommandRunner, unit: &str) -> Option<String> {
    runner.stdout_of(
        "journalctl",
        &["-u", unit, "--since", "1 hour ago", "-p", "err", "-q", "--no-pager"],
    )
}

/// Run every service check.
pub fn run_service_checks(
    checklist: &mut Checklist,
    runner: &dyn CommandRunner,
    exp: &ServiceExpectations,
) {
    for unit in &exp.healthy {
        checklist.run(format!("service {} healthy", unit), || {
            check_health(runner, unit, exp.max_memory_bytes)
        });
    }
    checklist.run("service dependency chain", || {
        check_dependencies(runner, &exp.dependencies)
    });
    checklist.run("service restart policies", || {
        check_restart_policy(runner, &exp.restart_policy, &exp.allowed_restart_values)
    });
    checklist.run("no deprecated unit options", || {
        check_deprecated_options(runner, &exp.deprecated_option_units, &exp.deprecated_options)
    });
}

pub fn check_health(runner: &dyn CommandRunner, unit: &str, max_memory: u64) -> CheckOutcome {
    let Some(props) = unit_properties(runner, unit) else {
        return CheckOutcome::failed(format!("cannot query unit {}", unit));
    };
    if props.active_state() != Some("active") {
        return CheckOutcome::failed(format!(
            "{} is not active ({})",
            unit,
            props.active_state().unwrap_or("unknown")
        ));
    }
    match recent_errors(runner, unit) {
        None => return CheckOutcome::failed(format!("cannot read journal for {}", unit)),
        Some(entries) if !entries.is_empty() => {
            let count = entries.lines().count();
            return CheckOutcome::failed(format!(
                "{} logged {} error(s) in the last hour",
                unit, count
            ));
        }
        Some(_) => {}
    }
    match props.memory_current() {
        Some(bytes) if bytes > max_memory => CheckOutcome::failed(format!(
            "{} is using {} bytes of memory (limit {})",
            unit, bytes, max_memory
        )),
        _ => CheckOutcome::Passed,
    }
}

pub fn check_dependencies(
    runner: &dyn CommandRunner,
    dependencies: &BTreeMap<String, Vec<String>>,
) -> CheckOutcome {
    let mut problems = Vec::new();
    for (unit, deps) in dependencies {
        if !is_active(runner, unit) {
            problems.push(format!("{} is not running", unit));
        }
        for dep in deps {
            if !is_active(runner, dep) {
                problems.push(format!("dependency {} of {} is not running", dep, unit));
            }
        }
    }
    CheckOutcome::expect(problems.is_empty(), || problems.join("; "))
}

pub fn check_restart_policy(
    runner: &dyn CommandRunner,
    units: &[String],
    allowed: &[String],
) -> CheckOutcome {
    let mut problems = Vec::new();
    for unit in units {
        let restart = unit_properties(runner, unit)
            .and_then(|p| p.get("Restart").map(str::to_string))
            .unwrap_or_default();
        if !allowed.contains(&restart) {
            problems.push(format!("{} has restart policy '{}'", unit, restart));
        }
    }
    CheckOutcome::expect(problems.is_empty(), || problems.join("; "))
}

pub fn check_deprecated_options(
    runner: &dyn CommandRunner,
    units: &[String],
    deprecated: &[String],
) -> CheckOutcome {
    let mut problems = Vec::new();
    for unit in units {
        let Some(props) = unit_properties(runner, unit) else {
            problems.push(format!("cannot query unit {}", unit));
            continue;
        };
        for option in deprecated.iter().filter(|o| props.has_option(o)) {
            problems.push(format!("{} uses {}", unit, option));
        }
    }
    CheckOutcome::expect(problems.is_empty(), || problems.join("; "))
}

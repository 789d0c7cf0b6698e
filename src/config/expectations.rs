//! Expected properties of the target platform.
//!
//! Defaults describe Supabase Postgres on Ubuntu 24.04 LTS. A YAML file
//! passed with `--expectations` may override any subset of fields:
//!
//! ```yaml
//! os:
//!   version_prefix: "22.04"
//! database:
//!   wal_level: replica
//!   extensions: [pg_stat_statements]
//!   loadable_extensions: []
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompatError, Result};

/// Everything the checklist compares the host and database against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Expectations {
    pub os: OsExpectations,
    pub database: DatabaseExpectations,
    pub services: ServiceExpectations,
}

/// Operating system and system library expectations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OsExpectations {
    /// `ID` field of `/etc/os-release`.
    pub id: String,
    /// Required prefix of `VERSION_ID`.
    pub version_prefix: String,
    /// Whether `VERSION` must mention LTS.
    pub require_lts: bool,
    pub min_kernel_major: u32,
    pub min_systemd: u32,
    /// Any of these substrings must appear in the first line of `ldd --version`.
    pub glibc_markers: Vec<String>,
    pub openssl_marker: String,
    pub python_marker: String,
    pub network_manager_marker: String,
    pub apt_marker: String,
}

impl Default for OsExpectations {
    fn default() -> Self {
        Self {
            id: "ubuntu".to_string(),
            version_prefix: "24.04".to_string(),
            require_lts: true,
            min_kernel_major: 6,
            min_systemd: 255,
            glibc_markers: vec!["2.39".to_string(), "2.4".to_string()],
            openssl_marker: "3.".to_string(),
            python_marker: "3.12".to_string(),
            network_manager_marker: "1.44".to_string(),
            apt_marker: "2.7".to_string(),
        }
    }
}

/// Database configuration and extension expectations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseExpectations {
    /// Expected `wal_level`; `None` skips the check.
    pub wal_level: Option<String>,
    /// Minimum `max_replication_slots`; `None` skips the check.
    pub min_replication_slots: Option<u32>,
    /// Extensions that must appear in `pg_available_extensions`.
    pub extensions: Vec<String>,
    /// Extensions that must load with `CREATE EXTENSION`.
    pub loadable_extensions: Vec<String>,
    /// Schema that loadable extensions are created in.
    pub extension_schema: String,
}

impl Default for DatabaseExpectations {
    fn default() -> Self {
        Self {
            wal_level: Some("logical".to_string()),
            min_replication_slots: Some(5),
            extensions: [
                "pg_stat_statements",
                "pgaudit",
                "pg_cron",
                "postgis",
                "pgtap",
                "vector",
                "pgsodium",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            loadable_extensions: vec!["pg_cron".to_string()],
            extension_schema: "extensions".to_string(),
        }
    }
}

/// systemd unit expectations for AMI hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceExpectations {
    /// Units that must be active, error-free and within the memory limit.
    pub healthy: Vec<String>,
    /// Unit -> units that must also be running.
    pub dependencies: BTreeMap<String, Vec<String>>,
    /// Units that must carry a restarting `Restart=` policy.
    pub restart_policy: Vec<String>,
    /// Accepted `Restart=` values.
    pub allowed_restart_values: Vec<String>,
    /// Units checked for deprecated options.
    pub deprecated_option_units: Vec<String>,
    /// `key=value` pairs that must not appear in `systemctl show`.
    pub deprecated_options: Vec<String>,
    /// Upper bound for `MemoryCurrent`.
    pub max_memory_bytes: u64,
}

impl Default for ServiceExpectations {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut dependencies = BTreeMap::new();
        dependencies.insert("postgresql".to_string(), strings(&["pgbouncer", "postgrest"]));
        dependencies.insert("pgbouncer".to_string(), strings(&["postgrest"]));
        dependencies.insert("postgrest".to_string(), strings(&["kong"]));
        dependencies.insert("gotrue".to_string(), strings(&["kong"]));
        dependencies.insert("kong".to_string(), strings(&["nginx"]));

        Self {
            healthy: strings(&[
                "postgresql",
                "pgbouncer",
                "postgrest",
                "gotrue",
                "kong",
                "nginx",
                "vector",
                "salt-minion",
            ]),
            dependencies,
            restart_policy: strings(&[
                "postgresql",
                "pgbouncer",
                "postgrest",
                "gotrue",
                "kong",
                "nginx",
                "vector",
            ]),
            allowed_restart_values: strings(&["always", "on-success", "on-failure"]),
            deprecated_option_units: strings(&[
                "postgresql",
                "pgbouncer",
                "postgrest",
                "gotrue",
                "kong",
                "nginx",
            ]),
            deprecated_options: strings(&["Type=simple", "RestartSec=0", "TimeoutStartSec=0"]),
            max_memory_bytes: 1024 * 1024 * 1024,
        }
    }
}

impl Expectations {
    /// Parse expectations from YAML text.
    pub fn from_yaml(source: &str, path: &Path) -> Result<Self> {
        serde_yaml::from_str(source).map_err(|e| CompatError::ConfigParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load expectations from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CompatError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let source = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded expectations from {}", path.display());
        Self::from_yaml(&source, path)
    }

    /// Load from `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_target_ubuntu_2404() {
        let exp = Expectations::default();
        assert_eq!(exp.os.id, "ubuntu");
        assert_eq!(exp.os.version_prefix, "24.04");
        assert_eq!(exp.os.min_systemd, 255);
        assert_eq!(exp.database.wal_level.as_deref(), Some("logical"));
        assert!(exp.database.extensions.contains(&"vector".to_string()));
        assert_eq!(exp.services.max_memory_bytes, 1 << 30);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = r#"
os:
  version_prefix: "22.04"
database:
  wal_level: replica
"#;
        let exp = Expectations::from_yaml(yaml, Path::new("x.yml")).unwrap();
        assert_eq!(exp.os.version_prefix, "22.04");
        assert_eq!(exp.os.id, "ubuntu");
        assert_eq!(exp.database.wal_level.as_deref(), Some("replica"));
        assert_eq!(exp.database.min_replication_slots, Some(5));
    }

    #[test]
    fn null_wal_level_disables_check() {
        let yaml = "database:\n  wal_level: null\n";
        let exp = Expectations::from_yaml(yaml, Path::new("x.yml")).unwrap();
        assert!(exp.database.wal_level.is_none());
    }

    #[test]
    fn unknown_field_is_parse_error() {
        let yaml = "os:\n  flavour: debian\n";
        let err = Expectations::from_yaml(yaml, Path::new("bad.yml")).unwrap_err();
        assert!(matches!(err, CompatError::ConfigParseError { .. }));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = Expectations::load(&temp.path().join("missing.yml")).unwrap_err();
        assert!(matches!(err, CompatError::ConfigNotFound { .. }));
    }

    #[test]
    fn load_reads_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("expect.yml");
        fs::write(&path, "services:\n  healthy: [postgresql]\n").unwrap();

        let exp = Expectations::load(&path).unwrap();
        assert_eq!(exp.services.healthy, vec!["postgresql".to_string()]);
    }

    #[test]
    fn load_or_default_without_path() {
        let exp = Expectations::load_or_default(None).unwrap();
        assert_eq!(exp, Expectations::default());
    }
}

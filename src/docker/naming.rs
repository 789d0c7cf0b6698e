//! Naming convention for everything a run creates.
//!
//! Every container and network carries [`RESOURCE_PREFIX`] followed by a
//! per-run id, and every working directory starts with [`WORKDIR_PREFIX`].
//! The cleanup utility relies on nothing else to find orphans.

use chrono::{DateTime, Utc};

/// Prefix of every container and network created by pgcompat.
pub const RESOURCE_PREFIX: &str = "pgcompat_";

/// Prefix of every temporary working directory created by pgcompat.
pub const WORKDIR_PREFIX: &str = "pgcompat-";

/// Prefixes left behind by the older script-based harness.
pub const LEGACY_CONTAINER_PREFIXES: &[&str] = &["test_postgres_"];

/// Network prefixes left behind by the older script-based harness.
pub const LEGACY_NETWORK_PREFIXES: &[&str] = &["supabase_test_"];

/// Identifier shared by all resources of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunId(String);

impl RunId {
    /// Generate an id from the current time and process id.
    pub fn generate() -> Self {
        Self::from_parts(Utc::now(), std::process::id())
    }

    /// Build an id from explicit parts.
    pub fn from_parts(at: DateTime<Utc>, pid: u32) -> Self {
        RunId(format!("{}{}", at.format("%Y%m%d%H%M%S"), pid))
    }

    /// The raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix shared by every container of this run.
    pub fn prefix(&self) -> String {
        format!("{}{}_", RESOURCE_PREFIX, self.0)
    }

    /// Name for a container playing `role` in this run.
    pub fn container_name(&self, role: &str) -> String {
        format!("{}{}", self.prefix(), role)
    }

    /// Name of this run's network.
    pub fn network_name(&self) -> String {
        format!("{}net", self.prefix())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a container name belongs to any pgcompat run.
pub fn is_test_container(name: &str) -> bool {
    name.starts_with(RESOURCE_PREFIX)
        || LEGACY_CONTAINER_PREFIXES
            .iter()
            .any(|p| name.starts_with(p))
}

/// Whether a network name belongs to any pgcompat run.
pub fn is_test_network(name: &str) -> bool {
    name.starts_with(RESOURCE_PREFIX) || LEGACY_NETWORK_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Whether a temp directory entry was created by pgcompat.
pub fn is_test_workdir(name: &str) -> bool {
    name.starts_with(WORKDIR_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_id() -> RunId {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        RunId::from_parts(at, 4242)
    }

    #[test]
    fn run_id_is_timestamp_and_pid() {
        assert_eq!(fixed_id().as_str(), "202610190830004242");
    }

    #[test]
    fn container_and_network_names_share_prefix() {
        let id = fixed_id();
        let container = id.container_name("postgres");
        let network = id.network_name();
        assert_eq!(container, "pgcompat_202610190830004242_postgres");
        assert!(container.starts_with(&id.prefix()));
        assert!(network.starts_with(&id.prefix()));
    }

    #[test]
    fn generated_names_are_recognised_by_cleanup() {
        let id = RunId::generate();
        assert!(is_test_container(&id.container_name("postgres")));
        assert!(is_test_network(&id.network_name()));
    }

    #[test]
    fn legacy_names_are_recognised() {
        assert!(is_test_container("test_postgres_15_1718000000"));
        assert!(is_test_network("supabase_test_1718000000"));
    }

    #[test]
    fn unrelated_names_are_not_recognised() {
        assert!(!is_test_container("my_postgres"));
        assert!(!is_test_container("prod_pgcompat_db"));
        assert!(!is_test_network("bridge"));
        assert!(!is_test_workdir("pgcompat_not_a_dir"));
        assert!(is_test_workdir("pgcompat-docker-Ab12Cd"));
    }
}

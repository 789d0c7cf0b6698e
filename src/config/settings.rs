//! Connection settings.
//!
//! Credentials and endpoints are collected once (from CLI flags, which
//! fall back to the `POSTGRES_*` environment variables) into a [`Settings`]
//! value that is handed to every runner explicitly.

use std::time::Duration;

use serde::Serialize;

/// Default PostgreSQL image for container runs.
pub const DEFAULT_POSTGRES_IMAGE: &str = "supabase/postgres:15-latest";
/// Default pgBouncer image for `--stack` runs.
pub const DEFAULT_PGBOUNCER_IMAGE: &str = "pgbouncer/pgbouncer:latest";
/// Default PostgREST image for `--stack` runs.
pub const DEFAULT_POSTGREST_IMAGE: &str = "postgrest/postgrest:v12.2.3";

/// Container images used by the Docker runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Images {
    pub postgres: String,
    pub pgbouncer: String,
    pub postgrest: String,
}

impl Default for Images {
    fn default() -> Self {
        Self {
            postgres: DEFAULT_POSTGRES_IMAGE.to_string(),
            pgbouncer: DEFAULT_PGBOUNCER_IMAGE.to_string(),
            postgrest: DEFAULT_POSTGREST_IMAGE.to_string(),
        }
    }
}

/// Connection and provisioning settings for a test run.
///
/// # Example
///
/// ```
/// use pgcompat::config::Settings;
///
/// let settings = Settings::default().with_password("secret");
/// assert_eq!(settings.host, "localhost");
/// assert_eq!(settings.user, "postgres");
/// assert_eq!(settings.password, "secret");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Database host for AMI runs (`POSTGRES_HOST`); container runs use the
    /// local Docker host.
    pub host: String,
    /// Database port for AMI runs; container runs use the published port.
    pub port: u16,
    /// Database user (`POSTGRES_USER`).
    pub user: String,
    /// Database password (`POSTGRES_PASSWORD`).
    #[serde(skip_serializing)]
    pub password: String,
    /// Database name (`POSTGRES_DB`).
    pub database: String,
    /// pgBouncer listen port inside its container.
    pub pgbouncer_port: u16,
    /// PostgREST listen port inside its container.
    pub postgrest_port: u16,
    /// Per-attempt connect timeout.
    #[serde(skip)]
    pub connect_timeout: Duration,
    /// Images for container runs.
    pub images: Images,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "postgres".to_string(),
            pgbouncer_port: 6543,
            postgrest_port: 3000,
            connect_timeout: Duration::from_secs(5),
            images: Images::default(),
        }
    }
}

impl Settings {
    /// Replace the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Replace the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// A password guaranteed to differ from the configured one.
    ///
    /// Used to verify the server actually enforces password authentication.
    pub fn wrong_password(&self) -> &'static str {
        if self.password == "postgres" {
            "pgcompat-invalid-password"
        } else {
            "postgres"
        }
    }

    /// Environment passed to the PostgreSQL container.
    pub fn postgres_container_env(&self) -> Vec<(String, String)> {
        vec![
            ("POSTGRES_DB".to_string(), self.database.clone()),
            ("POSTGRES_USER".to_string(), self.user.clone()),
            ("POSTGRES_PASSWORD".to_string(), self.password.clone()),
            ("POSTGRES_HOST_AUTH_METHOD".to_string(), "md5".to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 5432);
        assert_eq!(settings.user, "postgres");
        assert_eq!(settings.password, "postgres");
        assert_eq!(settings.database, "postgres");
        assert_eq!(settings.images.postgres, DEFAULT_POSTGRES_IMAGE);
    }

    #[test]
    fn wrong_password_differs_from_default() {
        let settings = Settings::default();
        assert_ne!(settings.wrong_password(), settings.password);
    }

    #[test]
    fn wrong_password_is_default_when_custom_password_set() {
        let settings = Settings::default().with_password("secret");
        assert_eq!(settings.wrong_password(), "postgres");
    }

    #[test]
    fn container_env_uses_md5_and_credentials() {
        let settings = Settings::default().with_password("secret");
        let env = settings.postgres_container_env();
        assert!(env.contains(&("POSTGRES_PASSWORD".to_string(), "secret".to_string())));
        assert!(env.contains(&("POSTGRES_HOST_AUTH_METHOD".to_string(), "md5".to_string())));
    }

    #[test]
    fn password_is_not_serialized() {
        let settings = Settings::default().with_password("hunter2");
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("localhost"));
    }
}

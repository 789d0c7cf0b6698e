//! PostgreSQL access.

use std::time::Duration;

use postgres::{Config, NoTls, SimpleQueryMessage};

use crate::config::Settings;
use crate::error::Result;

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub connect_timeout: Duration,
}

impl ConnectionTarget {
    /// Build a target from settings, using the configured port.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            user: settings.user.clone(),
            password: settings.password.clone(),
            database: settings.database.clone(),
            connect_timeout: settings.connect_timeout,
        }
    }

    /// Same target on a different host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Same target on a different port (published container ports).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Same target with a different password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// `host:port` for display.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Rows returned by a query, as text.
///
/// Values come from the simple query protocol, so every column is its text
/// representation and SQL `NULL` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rows(pub Vec<Vec<Option<String>>>);

impl Rows {
    /// Build rows from string literals (used by tests and mocks).
    pub fn from_values(rows: &[&[&str]]) -> Self {
        Rows(
            rows.iter()
                .map(|r| r.iter().map(|v| Some(v.to_string())).collect())
                .collect(),
        )
    }

    /// No rows.
    pub fn empty() -> Self {
        Rows(Vec::new())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First column of the first row.
    pub fn first_value(&self) -> Option<&str> {
        self.0.first()?.first()?.as_deref()
    }

    /// All non-null values of one column.
    pub fn column(&self, index: usize) -> Vec<&str> {
        self.0
            .iter()
            .filter_map(|row| row.get(index)?.as_deref())
            .collect()
    }
}

/// Executes SQL against a server.
///
/// Each call opens its own connection, mirroring how a fresh client
/// would see the server.
pub trait Database {
    /// Open and close a connection.
    fn ping(&self, target: &ConnectionTarget) -> Result<()>;

    /// Run one or more `;`-separated statements and return the rows of
    /// every statement that produced any.
    fn query(&self, target: &ConnectionTarget, sql: &str) -> Result<Rows>;
}

/// [`Database`] backed by the `postgres` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgDatabase;

impl PgDatabase {
    /// Create a new client.
    pub fn new() -> Self {
        Self
    }

    fn connect(&self, target: &ConnectionTarget) -> Result<postgres::Client> {
        let mut config = Config::new();
        config
            .host(&target.host)
            .port(target.port)
            .user(&target.user)
            .password(&target.password)
            .dbname(&target.database)
            .connect_timeout(target.connect_timeout)
            .application_name("pgcompat");
        tracing::debug!(
            "Connecting to {} as {}",
            target.endpoint(),
            target.user
        );
        Ok(config.connect(NoTls)?)
    }
}

impl Database for PgDatabase {
    fn ping(&self, target: &ConnectionTarget) -> Result<()> {
        let client = self.connect(target)?;
        client.close()?;
        Ok(())
    }

    fn query(&self, target: &ConnectionTarget, sql: &str) -> Result<Rows> {
        let mut client = self.connect(target)?;
        let messages = client.simple_query(sql)?;

        let mut rows = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                rows.push(
                    (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect(),
                );
            }
        }
        client.close()?;
        Ok(Rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_from_settings() {
        let settings = Settings::default().with_host("db.internal");
        let target = ConnectionTarget::from_settings(&settings);
        assert_eq!(target.endpoint(), "db.internal:5432");
        assert_eq!(target.user, "postgres");
    }

    #[test]
    fn target_with_port_and_password() {
        let target = ConnectionTarget::from_settings(&Settings::default())
            .with_port(49153)
            .with_password("secret");
        assert_eq!(target.port, 49153);
        assert_eq!(target.password, "secret");
    }

    #[test]
    fn target_with_host_keeps_credentials() {
        let settings = Settings::default().with_host("ami.internal").with_password("secret");
        let target = ConnectionTarget::from_settings(&settings)
            .with_host("localhost")
            .with_port(49153);
        assert_eq!(target.endpoint(), "localhost:49153");
        assert_eq!(target.password, "secret");
    }

    #[test]
    fn rows_first_value() {
        let rows = Rows::from_values(&[&["1", "a"], &["2", "b"]]);
        assert_eq!(rows.first_value(), Some("1"));
        assert_eq!(rows.len(), 2);
        assert!(Rows::empty().first_value().is_none());
    }

    #[test]
    fn rows_column_skips_nulls() {
        let rows = Rows(vec![
            vec![Some("vector".to_string())],
            vec![None],
            vec![Some("pg_cron".to_string())],
        ]);
        assert_eq!(rows.column(0), vec!["vector", "pg_cron"]);
        assert!(rows.column(3).is_empty());
    }
}

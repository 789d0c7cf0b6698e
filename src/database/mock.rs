//! In-memory database double for testing.
//!
//! `MockDatabase` answers queries from a table keyed by the exact SQL text
//! and can enforce a single accepted password, which is enough to drive
//! every check in [`checks::sql`](crate::checks::sql) without a server.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{CompatError, Result};

use super::client::{ConnectionTarget, Database, Rows};

/// Scripted [`Database`].
#[derive(Debug, Default)]
pub struct MockDatabase {
    responses: RefCell<HashMap<String, std::result::Result<Rows, String>>>,
    accepted_password: Option<String>,
    reachable: bool,
    pings_until_ready: RefCell<u32>,
    executed: RefCell<Vec<String>>,
    endpoints: RefCell<Vec<String>>,
}

impl MockDatabase {
    /// A reachable server with no scripted queries and no password check.
    pub fn new() -> Self {
        Self {
            reachable: true,
            ..Default::default()
        }
    }

    /// A server that refuses every connection.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Default::default()
        }
    }

    /// Only accept connections using this password.
    pub fn with_password(mut self, password: &str) -> Self {
        self.accepted_password = Some(password.to_string());
        self
    }

    /// Fail the first `n` pings, as a server still starting up would.
    pub fn ready_after(self, n: u32) -> Self {
        *self.pings_until_ready.borrow_mut() = n;
        self
    }

    /// Script the rows returned for a SQL statement.
    pub fn respond(&self, sql: &str, rows: Rows) {
        self.responses
            .borrow_mut()
            .insert(sql.to_string(), Ok(rows));
    }

    /// Script a failure for a SQL statement.
    pub fn fail(&self, sql: &str, message: &str) {
        self.responses
            .borrow_mut()
            .insert(sql.to_string(), Err(message.to_string()));
    }

    /// SQL statements executed so far.
    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    /// Distinct `host:port` endpoints connected to so far, in first-use order.
    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.borrow().clone()
    }

    fn authenticate(&self, target: &ConnectionTarget) -> Result<()> {
        let endpoint = target.endpoint();
        if !self.endpoints.borrow().contains(&endpoint) {
            self.endpoints.borrow_mut().push(endpoint);
        }
        if !self.reachable {
            return Err(CompatError::Database {
                message: format!("connection refused: {}", target.endpoint()),
            });
        }
        match &self.accepted_password {
            Some(expected) if *expected != target.password => Err(CompatError::Database {
                message: format!(
                    "FATAL: password authentication failed for user \"{}\"",
                    target.user
                ),
            }),
            _ => Ok(()),
        }
    }
}

impl Database for MockDatabase {
    fn ping(&self, target: &ConnectionTarget) -> Result<()> {
        let mut remaining = self.pings_until_ready.borrow_mut();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(CompatError::Database {
                message: "the database system is starting up".to_string(),
            });
        }
        self.authenticate(target)
    }

    fn query(&self, target: &ConnectionTarget, sql: &str) -> Result<Rows> {
        self.authenticate(target)?;
        self.executed.borrow_mut().push(sql.to_string());
        match self.responses.borrow().get(sql) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(message)) => Err(CompatError::Database {
                message: message.clone(),
            }),
            None => Ok(Rows::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn target() -> ConnectionTarget {
        ConnectionTarget::from_settings(&Settings::default())
    }

    #[test]
    fn returns_scripted_rows() {
        let db = MockDatabase::new();
        db.respond("SELECT 1;", Rows::from_values(&[&["1"]]));
        let rows = db.query(&target(), "SELECT 1;").unwrap();
        assert_eq!(rows.first_value(), Some("1"));
        assert_eq!(db.executed(), vec!["SELECT 1;"]);
    }

    #[test]
    fn rejects_wrong_password() {
        let db = MockDatabase::new().with_password("secret");
        assert!(db.ping(&target()).is_err());
        assert!(db.ping(&target().with_password("secret")).is_ok());
    }

    #[test]
    fn records_distinct_endpoints() {
        let db = MockDatabase::new();
        db.ping(&target()).unwrap();
        db.ping(&target()).unwrap();
        db.ping(&target().with_port(6543)).unwrap();
        assert_eq!(db.endpoints(), vec!["localhost:5432", "localhost:6543"]);
    }

    #[test]
    fn unreachable_refuses_everything() {
        let db = MockDatabase::unreachable();
        assert!(db.ping(&target()).is_err());
        assert!(db.query(&target(), "SELECT 1;").is_err());
    }

    #[test]
    fn ready_after_fails_first_pings() {
        let db = MockDatabase::new().ready_after(2);
        assert!(db.ping(&target()).is_err());
        assert!(db.ping(&target()).is_err());
        assert!(db.ping(&target()).is_ok());
    }

    #[test]
    fn scripted_failure_is_database_error() {
        let db = MockDatabase::new();
        db.fail("SHOW wal_level;", "permission denied");
        let err = db.query(&target(), "SHOW wal_level;").unwrap_err();
        assert!(err.to_string().contains("permission denied"));
    }
}

//! pgcompat - PostgreSQL compatibility harness for Supabase on Ubuntu 24.04.
//!
//! pgcompat verifies that a PostgreSQL service behaves as expected on a
//! target host, either inside a throwaway container or as the service
//! installed on an AMI, and reports every check as pass, fail or skip.
//!
//! # Modules
//!
//! - [`checks`] - Checklist plus the SQL, system and service checks
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Connection settings and expectations
//! - [`database`] - PostgreSQL access and readiness polling
//! - [`docker`] - Docker CLI wrapper and resource naming
//! - [`error`] - Error types and result aliases
//! - [`probe`] - Read-only host inspection
//! - [`runner`] - Run lifecycle, runners, aggregation and cleanup
//! - [`shell`] - External command execution
//! - [`ui`] - Spinners, check lines and summaries
//!
//! # Example
//!
//! ```
//! use pgcompat::docker::naming::{is_test_container, RESOURCE_PREFIX};
//!
//! assert!(is_test_container(&format!("{}20261019_postgres", RESOURCE_PREFIX)));
//! assert!(!is_test_container("my_postgres"));
//! ```

pub mod checks;
pub mod cli;
pub mod config;
pub mod database;
pub mod docker;
pub mod error;
pub mod probe;
pub mod runner;
pub mod shell;
pub mod ui;

pub use error::{CompatError, Result};

//! Database connectivity.
//!
//! - [`client`] - Connection targets, the [`Database`] trait and its
//!   `postgres`-backed implementation
//! - [`mock`] - Scripted database for tests
//! - [`readiness`] - Polling a starting service with bounded backoff

pub mod client;
pub mod mock;
pub mod readiness;

pub use client::{ConnectionTarget, Database, PgDatabase, Rows};
pub use mock::MockDatabase;
pub use readiness::{wait_for_http, wait_for_postgres, wait_until, RetryPolicy};

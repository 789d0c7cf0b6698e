//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. Every command receives the same
//! [`RunContext`], so the real `docker`/`systemctl`/PostgreSQL collaborators
//! can be swapped for mocks in one place.

pub mod all;
pub mod ami;
pub mod cleanup;
pub mod completions;
pub mod dispatcher;
pub mod display;
pub mod docker;
pub mod info;

pub use dispatcher::{Command, CommandDispatcher, CommandResult, RunContext};

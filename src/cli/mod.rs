//! Command-line interface for pgcompat.
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{
    AllArgs, AmiArgs, CleanupArgs, Cli, Commands, CompletionsArgs, ConnectionArgs, DockerArgs,
    InfoArgs,
};
pub use commands::{Command, CommandDispatcher, CommandResult, RunContext};

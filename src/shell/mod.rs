//! External command execution and platform helpers.

pub mod command;
pub mod mock;
pub mod platform;

pub use command::{display_command, CommandResult, CommandRunner, SystemRunner};
pub use mock::MockRunner;
pub use platform::is_ci;

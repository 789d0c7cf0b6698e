//! Run configuration.
//!
//! - [`settings`] - Connection credentials, ports and container images
//! - [`expectations`] - Expected OS, database and service properties

pub mod expectations;
pub mod settings;

pub use expectations::{
    DatabaseExpectations, Expectations, OsExpectations, ServiceExpectations,
};
pub use settings::{Images, Settings};

//! Host inspection.
//!
//! - [`os_release`] - `/etc/os-release` parser
//! - [`report`] - [`SystemReport`] collection for `show-system-info`

pub mod os_release;
pub mod report;

pub use os_release::OsRelease;
pub use report::{ReportSection, SystemReport, NOT_INSTALLED, UNAVAILABLE, UNKNOWN};

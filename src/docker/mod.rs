//! Container runtime integration.
//!
//! - [`naming`] - Resource naming convention shared with the cleanup utility
//! - [`runtime`] - `docker` CLI wrapper

pub mod naming;
pub mod runtime;

pub use naming::{
    is_test_container, is_test_network, is_test_workdir, RunId, RESOURCE_PREFIX, WORKDIR_PREFIX,
};
pub use runtime::{parse_host_port, ContainerSpec, DockerCli};

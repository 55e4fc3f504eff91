//! reprobox-docker: Docker backend for reprobox
//!
//! Implements the build gateway and container provisioner contracts of
//! `reprobox-core` by driving the `docker` command-line client. Every
//! container runs under a `reprobox-<uuid>` name and is removed with
//! `docker rm --force` when validation ends.

pub mod build;
pub mod client;
pub mod container;
pub mod error;
pub mod process;

pub use build::{DockerBuildGateway, ImageStatus};
pub use client::DockerClient;
pub use container::{DockerContainer, DockerProvisioner};
pub use error::DockerError;

use reprobox_core::{BugRegistry, ReproboxConfig};

/// Result type for Docker client operations
pub type Result<T> = std::result::Result<T, DockerError>;

/// Check if the configured Docker client is available
pub fn is_docker_available(config: &ReproboxConfig) -> bool {
    DockerClient::from_config(config).is_available()
}

/// Gateway and provisioner sharing one client, with every image the
/// registry declares known for dependency builds.
pub fn backend(
    config: &ReproboxConfig,
    registry: &BugRegistry,
) -> (DockerBuildGateway, DockerProvisioner) {
    let client = DockerClient::from_config(config);
    let gateway = DockerBuildGateway::new(client.clone()).with_known(registry.build_instructions());
    (gateway, DockerProvisioner::new(client))
}

//! Error types for the build gateway and container contracts.

/// Errors produced while building or managing a bug image.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to build image {tag}: {reason}")]
    BuildFailed { tag: String, reason: String },

    #[error("image {tag} depends on {dependency}, which could not be built or downloaded")]
    MissingDependency { tag: String, dependency: String },

    #[error("dependency cycle while building {tag}: {chain}")]
    DependencyCycle { tag: String, chain: String },

    #[error("image {tag} is not installed")]
    NotInstalled { tag: String },

    #[error("failed to uninstall image {tag}: {reason}")]
    UninstallFailed { tag: String, reason: String },

    #[error("image backend unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while starting a container.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("image {tag} is not installed")]
    ImageMissing { tag: String },

    #[error("failed to start container from {tag}: {reason}")]
    StartFailed { tag: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by a live container.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("failed to run {task} in container {container}: {reason}")]
    Exec {
        container: String,
        task: String,
        reason: String,
    },

    #[error("failed to destroy container {container}: {reason}")]
    Destroy { container: String, reason: String },

    #[error("container {container} has already been destroyed")]
    Destroyed { container: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

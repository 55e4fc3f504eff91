//! Domain-level error taxonomy for reprobox.

use crate::dataset::DatasetError;
use crate::gateway::{BuildError, ContainerError, ProvisionError};

/// reprobox domain errors.
#[derive(Debug, thiserror::Error)]
pub enum ReproboxError {
    #[error("bug not found: {0}")]
    BugNotFound(String),

    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("provision error: {0}")]
    Provision(#[from] ProvisionError),

    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for reprobox domain operations.
pub type Result<T> = std::result::Result<T, ReproboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bug_not_found_display() {
        let err = ReproboxError::BugNotFound("manybugs:php:1".to_string());
        assert!(err.to_string().contains("bug not found"));
        assert!(err.to_string().contains("manybugs:php:1"));
    }

    #[test]
    fn test_build_error_converts() {
        let err: ReproboxError = BuildError::NotInstalled {
            tag: "reprobox/demo:1".to_string(),
        }
        .into();
        assert!(matches!(err, ReproboxError::Build(_)));
        assert!(err.to_string().contains("reprobox/demo:1"));
    }

    #[test]
    fn test_container_error_converts() {
        let err: ReproboxError = ContainerError::Destroy {
            container: "abc123".to_string(),
            reason: "no such container".to_string(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("no such container"));
    }
}

//! Error types for reprobox-docker

use thiserror::Error;

/// Errors raised while driving the Docker client.
#[derive(Error, Debug)]
pub enum DockerError {
    /// Client binary not found
    #[error("docker client `{0}` is not installed or not in PATH")]
    ClientNotFound(String),

    /// Client ran and reported failure
    #[error("docker {command} failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Client was killed after its time limit
    #[error("docker {command} timed out after {secs}s")]
    TimedOut { command: String, secs: u64 },

    /// Output reader thread failed
    #[error("failed to capture output: {0}")]
    Output(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

//! What a container reports back after compiling or running a test.

use serde::{Deserialize, Serialize};

/// Raw response of a command executed inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecResponse {
    /// Exit code, `None` when the process was killed.
    pub exit_code: Option<i32>,

    /// Combined stdout and stderr.
    pub output: String,

    pub duration_ms: u64,

    /// Whether the time limit elapsed before the command finished.
    pub timed_out: bool,
}

impl ExecResponse {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            output: output.into(),
            duration_ms: 0,
            timed_out: false,
        }
    }

    pub fn timed_out(output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            exit_code: None,
            output: output.into(),
            duration_ms,
            timed_out: true,
        }
    }

    /// Exit code 0 within the time limit.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Outcome of a single test execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub passed: bool,
    pub response: ExecResponse,
}

impl TestOutcome {
    /// A test passes when its command succeeds.
    pub fn from_response(response: ExecResponse) -> Self {
        Self {
            passed: response.succeeded(),
            response,
        }
    }
}

/// Result of compiling the subject program inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResult {
    pub successful: bool,
    pub response: ExecResponse,
}

impl CompileResult {
    pub fn from_response(response: ExecResponse) -> Self {
        Self {
            successful: response.succeeded(),
            response,
        }
    }
}

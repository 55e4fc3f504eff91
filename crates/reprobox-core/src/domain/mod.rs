//! Domain models for reprobox.
//!
//! Canonical definitions for the core entities:
//! - `Bug`: a reproducible defect scenario (build + compile instructions, harness)
//! - `BuildInstructions`: the image a bug is materialized as
//! - `TestHarness`: the expected-pass / expected-fail test partition
//! - `TestOutcome` / `CompileResult`: what a container reports back

pub mod bug;
pub mod error;
pub mod harness;
pub mod outcome;

// Re-export main types and errors
pub use bug::{Bug, BuildInstructions, CompileInstructions};
pub use error::{ReproboxError, Result};
pub use harness::{
    ExplicitTest, ExplicitTestSuite, HarnessSpec, NumberedTestSuite, TestCase, TestHarness,
    TEST_ID_PLACEHOLDER,
};
pub use outcome::{CompileResult, ExecResponse, TestOutcome};

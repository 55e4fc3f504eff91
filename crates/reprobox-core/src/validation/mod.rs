//! Validation workflow: does a bug still reproduce its documented test outcomes?
//!
//! # Modules
//!
//! - [`orchestrator`] - `Validator`, the build/provision/compile/test/destroy state machine
//! - [`guard`]        - `ContainerGuard`, scoped ownership with guaranteed teardown
//! - [`report`]       - `ValidationReport`, `TestRecord`, `BatchSummary`
//! - [`reporter`]     - `Reporter` sinks and diagnostic formatting

pub mod guard;
pub mod orchestrator;
pub mod report;
pub mod reporter;

pub use guard::ContainerGuard;
pub use orchestrator::Validator;
pub use report::{
    BatchSummary, Expectation, TestRecord, ValidationFailure, ValidationOutcome, ValidationPhase,
    ValidationReport,
};
pub use reporter::{format_diagnostic, indent, ConsoleReporter, Reporter, SilentReporter};

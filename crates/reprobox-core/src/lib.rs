//! reprobox Core Library
//!
//! Bug registry, dataset manifests and the validation workflow that checks a
//! containerised bug still reproduces its documented test outcomes.

pub mod config;
pub mod dataset;
pub mod domain;
pub mod fakes;
pub mod gateway;
pub mod manager;
pub mod registry;
pub mod telemetry;
pub mod validation;

pub use config::ReproboxConfig;

pub use dataset::{Dataset, DatasetError, DatasetSource};

pub use domain::{
    Bug, BuildInstructions, CompileInstructions, CompileResult, ExecResponse, ExplicitTest,
    ExplicitTestSuite, HarnessSpec, NumberedTestSuite, ReproboxError, Result, TestCase,
    TestHarness, TestOutcome, TEST_ID_PLACEHOLDER,
};

pub use gateway::{
    BuildError, BuildGateway, Container, ContainerError, ContainerProvisioner, ProvisionError,
};

pub use manager::BugManager;
pub use registry::BugRegistry;

pub use validation::{
    BatchSummary, ConsoleReporter, ContainerGuard, Expectation, Reporter, SilentReporter,
    TestRecord, ValidationFailure, ValidationOutcome, ValidationPhase, ValidationReport, Validator,
};

pub use telemetry::init_tracing;

/// reprobox version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

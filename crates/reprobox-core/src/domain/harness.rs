//! Test harnesses: the expected-pass / expected-fail partition of a bug.

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the test identifier in numbered suites.
pub const TEST_ID_PLACEHOLDER: &str = "__ID__";

/// Default time limit for a single test execution.
pub const DEFAULT_TEST_TIME_LIMIT_SECS: u64 = 60;

fn default_test_time_limit() -> u64 {
    DEFAULT_TEST_TIME_LIMIT_SECS
}

/// A single executable test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Test identifier, unique within its harness.
    pub name: String,

    /// Shell command, run with `/bin/sh -c`.
    pub command: String,

    /// Working directory inside the container (empty = image default).
    pub context: String,

    pub time_limit_secs: u64,
}

/// Anything that can supply an ordered expected-pass / expected-fail partition.
///
/// Order is the execution and reporting order.
pub trait TestHarness: Send + Sync {
    /// Tests expected to pass.
    fn passing(&self) -> Vec<TestCase>;

    /// Tests expected to fail.
    fn failing(&self) -> Vec<TestCase>;

    fn total(&self) -> usize {
        self.passing().len() + self.failing().len()
    }
}

/// Suite of numbered tests driven by a single command template.
///
/// Expected-passing tests are `p1..pN`, expected-failing tests `n1..nM`; each
/// runs `command` with [`TEST_ID_PLACEHOLDER`] replaced by its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberedTestSuite {
    pub command: String,

    #[serde(default)]
    pub context: String,

    pub passing: usize,

    pub failing: usize,

    #[serde(default = "default_test_time_limit")]
    pub time_limit_secs: u64,
}

impl NumberedTestSuite {
    pub fn new(command: impl Into<String>, passing: usize, failing: usize) -> Self {
        Self {
            command: command.into(),
            context: String::new(),
            passing,
            failing,
            time_limit_secs: DEFAULT_TEST_TIME_LIMIT_SECS,
        }
    }

    pub fn in_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    fn numbered(&self, prefix: char, count: usize) -> Vec<TestCase> {
        (1..=count)
            .map(|i| {
                let name = format!("{prefix}{i}");
                TestCase {
                    command: self.command.replace(TEST_ID_PLACEHOLDER, &name),
                    name,
                    context: self.context.clone(),
                    time_limit_secs: self.time_limit_secs,
                }
            })
            .collect()
    }
}

impl TestHarness for NumberedTestSuite {
    fn passing(&self) -> Vec<TestCase> {
        self.numbered('p', self.passing)
    }

    fn failing(&self) -> Vec<TestCase> {
        self.numbered('n', self.failing)
    }

    fn total(&self) -> usize {
        self.passing + self.failing
    }
}

/// A test declared by name and command in an explicit suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitTest {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
}

impl ExplicitTest {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            context: None,
            time_limit_secs: None,
        }
    }
}

/// Suite listing every test individually.
///
/// Per-test `context` and `time_limit_secs` fall back to the suite defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitTestSuite {
    #[serde(default)]
    pub context: String,

    #[serde(default = "default_test_time_limit")]
    pub time_limit_secs: u64,

    #[serde(default)]
    pub passing: Vec<ExplicitTest>,

    #[serde(default)]
    pub failing: Vec<ExplicitTest>,
}

impl ExplicitTestSuite {
    pub fn new(passing: Vec<ExplicitTest>, failing: Vec<ExplicitTest>) -> Self {
        Self {
            context: String::new(),
            time_limit_secs: DEFAULT_TEST_TIME_LIMIT_SECS,
            passing,
            failing,
        }
    }

    fn expand(&self, tests: &[ExplicitTest]) -> Vec<TestCase> {
        tests
            .iter()
            .map(|t| TestCase {
                name: t.name.clone(),
                command: t.command.clone(),
                context: t.context.clone().unwrap_or_else(|| self.context.clone()),
                time_limit_secs: t.time_limit_secs.unwrap_or(self.time_limit_secs),
            })
            .collect()
    }
}

impl Default for ExplicitTestSuite {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl TestHarness for ExplicitTestSuite {
    fn passing(&self) -> Vec<TestCase> {
        self.expand(&self.passing)
    }

    fn failing(&self) -> Vec<TestCase> {
        self.expand(&self.failing)
    }

    fn total(&self) -> usize {
        self.passing.len() + self.failing.len()
    }
}

/// Harness description as declared in a dataset manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HarnessSpec {
    Numbered(NumberedTestSuite),
    Explicit(ExplicitTestSuite),
}

impl HarnessSpec {
    fn inner(&self) -> &dyn TestHarness {
        match self {
            HarnessSpec::Numbered(suite) => suite,
            HarnessSpec::Explicit(suite) => suite,
        }
    }
}

impl TestHarness for HarnessSpec {
    fn passing(&self) -> Vec<TestCase> {
        self.inner().passing()
    }

    fn failing(&self) -> Vec<TestCase> {
        self.inner().failing()
    }

    fn total(&self) -> usize {
        self.inner().total()
    }
}

impl From<NumberedTestSuite> for HarnessSpec {
    fn from(suite: NumberedTestSuite) -> Self {
        HarnessSpec::Numbered(suite)
    }
}

impl From<ExplicitTestSuite> for HarnessSpec {
    fn from(suite: ExplicitTestSuite) -> Self {
        HarnessSpec::Explicit(suite)
    }
}

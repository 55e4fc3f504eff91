//! Validation results: per-test records, outcome kinds and batch summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CompileResult, ExecResponse, TestCase, TestOutcome};

/// States of the validation state machine, in visiting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPhase {
    Idle,
    Building,
    Provisioning,
    Compiling,
    Testing,
    Destroying,
    Done,
    Failed,
}

impl ValidationPhase {
    pub fn name(&self) -> &'static str {
        match self {
            ValidationPhase::Idle => "idle",
            ValidationPhase::Building => "building",
            ValidationPhase::Provisioning => "provisioning",
            ValidationPhase::Compiling => "compiling",
            ValidationPhase::Testing => "testing",
            ValidationPhase::Destroying => "destroying",
            ValidationPhase::Done => "done",
            ValidationPhase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which group of the harness a test belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Pass,
    Fail,
}

/// What happened when one test was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub test: String,

    pub expected: Expectation,

    /// Observed result, `None` when the test could not be executed.
    pub passed: Option<bool>,

    pub response: Option<ExecResponse>,

    /// Execution error, when the container failed to run the test.
    pub error: Option<String>,
}

impl TestRecord {
    pub fn observed(test: &TestCase, expected: Expectation, outcome: TestOutcome) -> Self {
        Self {
            test: test.name.clone(),
            expected,
            passed: Some(outcome.passed),
            response: Some(outcome.response),
            error: None,
        }
    }

    pub fn errored(test: &TestCase, expected: Expectation, error: impl Into<String>) -> Self {
        Self {
            test: test.name.clone(),
            expected,
            passed: None,
            response: None,
            error: Some(error.into()),
        }
    }

    /// Whether the observed result agrees with the harness partition.
    ///
    /// A test that could not be executed never matches.
    pub fn matches_expectation(&self) -> bool {
        matches!(
            (self.expected, self.passed),
            (Expectation::Pass, Some(true)) | (Expectation::Fail, Some(false))
        )
    }

    /// Task status shown next to the test's task line.
    pub fn status_label(&self) -> &'static str {
        match (self.expected, self.passed) {
            (_, None) => "ERROR",
            (Expectation::Pass, Some(false)) => "UNEXPECTED: FAIL",
            (Expectation::Fail, Some(true)) => "UNEXPECTED: PASS",
            _ => "OK",
        }
    }

    /// Text shown in the indented diagnostic block of a mismatch.
    pub fn diagnostic_text(&self) -> &str {
        match (&self.error, &self.response) {
            (Some(error), _) => error.as_str(),
            (None, Some(response)) => response.output.as_str(),
            (None, None) => "",
        }
    }
}

/// Why a validation ended the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// Every test matched its expectation.
    Reproduced,

    /// The image could not be built; no container was created.
    BuildFailed { reason: String },

    /// The subject program did not compile; no tests were run.
    CompileFailed { output: String },

    /// At least one test disagreed with the harness partition.
    Mismatched { mismatches: usize },
}

impl ValidationOutcome {
    pub fn is_reproduced(&self) -> bool {
        matches!(self, ValidationOutcome::Reproduced)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValidationOutcome::Reproduced => "reproduced",
            ValidationOutcome::BuildFailed { .. } => "build failed",
            ValidationOutcome::CompileFailed { .. } => "compile failed",
            ValidationOutcome::Mismatched { .. } => "mismatched",
        }
    }
}

/// Full account of one validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub bug: String,
    pub outcome: ValidationOutcome,
    /// State-machine phases visited, in order.
    pub phases: Vec<ValidationPhase>,
    /// Identifier of the container used, if one was provisioned.
    pub container: Option<String>,
    pub compile: Option<CompileResult>,
    pub tests: Vec<TestRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ValidationReport {
    /// The boolean verdict: does the bug still reproduce its documented outcomes?
    pub fn verdict(&self) -> bool {
        self.outcome.is_reproduced()
    }

    /// Mismatched tests, in execution order.
    pub fn mismatches(&self) -> impl Iterator<Item = &TestRecord> {
        self.tests.iter().filter(|t| !t.matches_expectation())
    }

    pub fn reached(&self, phase: ValidationPhase) -> bool {
        self.phases.contains(&phase)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// A bug whose validation ended in an error rather than a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub bug: String,
    pub error: String,
}

/// Result of validating several bugs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub reports: Vec<ValidationReport>,
    pub errors: Vec<ValidationFailure>,
}

impl BatchSummary {
    /// Number of bugs that reproduced their documented outcomes.
    pub fn validated_count(&self) -> usize {
        self.reports.iter().filter(|r| r.verdict()).count()
    }

    /// Number of bugs with a `false` verdict.
    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| !r.verdict()).count()
    }

    /// Number of bugs whose validation raised an error.
    pub fn errored_count(&self) -> usize {
        self.errors.len()
    }

    pub fn all_validated(&self) -> bool {
        self.errors.is_empty() && self.reports.iter().all(|r| r.verdict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_case(name: &str) -> TestCase {
        TestCase {
            name: name.to_string(),
            command: format!("./test.sh {name}"),
            context: String::new(),
            time_limit_secs: 60,
        }
    }

    fn outcome(passed: bool, output: &str) -> TestOutcome {
        TestOutcome {
            passed,
            response: ExecResponse::new(if passed { 0 } else { 1 }, output),
        }
    }

    #[test]
    fn test_record_expectations() {
        let p = test_case("p1");
        let n = test_case("n1");

        let ok_pass = TestRecord::observed(&p, Expectation::Pass, outcome(true, ""));
        assert!(ok_pass.matches_expectation());
        assert_eq!(ok_pass.status_label(), "OK");

        let bad_pass = TestRecord::observed(&p, Expectation::Pass, outcome(false, "boom"));
        assert!(!bad_pass.matches_expectation());
        assert_eq!(bad_pass.status_label(), "UNEXPECTED: FAIL");
        assert_eq!(bad_pass.diagnostic_text(), "boom");

        let ok_fail = TestRecord::observed(&n, Expectation::Fail, outcome(false, ""));
        assert!(ok_fail.matches_expectation());

        let bad_fail = TestRecord::observed(&n, Expectation::Fail, outcome(true, "passed?"));
        assert!(!bad_fail.matches_expectation());
        assert_eq!(bad_fail.status_label(), "UNEXPECTED: PASS");
    }

    #[test]
    fn test_errored_record_never_matches() {
        let n = test_case("n1");
        let record = TestRecord::errored(&n, Expectation::Fail, "exec failed");
        assert!(!record.matches_expectation());
        assert_eq!(record.status_label(), "ERROR");
        assert_eq!(record.diagnostic_text(), "exec failed");
    }

    #[test]
    fn test_outcome_serializes_with_kind_tag() {
        let json = serde_json::to_value(ValidationOutcome::Mismatched { mismatches: 2 })
            .expect("serialize");
        assert_eq!(json["kind"], "mismatched");
        assert_eq!(json["mismatches"], 2);
    }

    #[test]
    fn test_batch_summary_counts() {
        let now = Utc::now();
        let report = |bug: &str, outcome: ValidationOutcome| ValidationReport {
            bug: bug.to_string(),
            outcome,
            phases: vec![ValidationPhase::Idle],
            container: None,
            compile: None,
            tests: vec![],
            started_at: now,
            finished_at: now,
        };

        let summary = BatchSummary {
            reports: vec![
                report("a", ValidationOutcome::Reproduced),
                report("b", ValidationOutcome::Mismatched { mismatches: 1 }),
                report("c", ValidationOutcome::Reproduced),
            ],
            errors: vec![ValidationFailure {
                bug: "d".to_string(),
                error: "provision error".to_string(),
            }],
        };

        assert_eq!(summary.validated_count(), 2);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.errored_count(), 1);
        assert!(!summary.all_validated());
        assert!(BatchSummary::default().all_validated());
    }
}

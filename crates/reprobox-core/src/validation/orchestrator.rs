//! The validation state machine.
//!
//! `Idle -> Building -> Provisioning -> Compiling -> Testing -> Destroying ->
//! Done`, with `Failed` reachable from `Building` (no container exists, so no
//! teardown) and from `Compiling` (after teardown).

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::guard::ContainerGuard;
use super::report::{Expectation, TestRecord, ValidationOutcome, ValidationPhase, ValidationReport};
use super::reporter::{format_diagnostic, Reporter};
use crate::domain::{Bug, CompileResult, Result, TestCase};
use crate::gateway::{BuildGateway, ContainerProvisioner};

const COMPILE_TASK: &str = "Compiling";

/// Mutable state of one validation while it runs.
struct ValidationRun {
    bug: String,
    phases: Vec<ValidationPhase>,
    container: Option<String>,
    compile: Option<CompileResult>,
    tests: Vec<TestRecord>,
    started_at: DateTime<Utc>,
}

impl ValidationRun {
    fn new(bug: &Bug) -> Self {
        Self {
            bug: bug.name.clone(),
            phases: vec![ValidationPhase::Idle],
            container: None,
            compile: None,
            tests: Vec::new(),
            started_at: Utc::now(),
        }
    }

    fn enter(&mut self, phase: ValidationPhase) {
        debug!(bug = %self.bug, phase = %phase, "Entering validation phase");
        self.phases.push(phase);
    }

    fn finish(mut self, outcome: ValidationOutcome) -> ValidationReport {
        let terminal = match outcome {
            ValidationOutcome::BuildFailed { .. } | ValidationOutcome::CompileFailed { .. } => {
                ValidationPhase::Failed
            }
            _ => ValidationPhase::Done,
        };
        self.enter(terminal);
        ValidationReport {
            bug: self.bug,
            outcome,
            phases: self.phases,
            container: self.container,
            compile: self.compile,
            tests: self.tests,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Drives one bug through build, provision, compile, test and teardown.
///
/// Execution is strictly sequential: tests run one at a time, the
/// expected-passing group before the expected-failing group, each in harness
/// order.
pub struct Validator<'a> {
    gateway: &'a dyn BuildGateway,
    provisioner: &'a dyn ContainerProvisioner,
}

impl<'a> Validator<'a> {
    pub fn new(gateway: &'a dyn BuildGateway, provisioner: &'a dyn ContainerProvisioner) -> Self {
        Self {
            gateway,
            provisioner,
        }
    }

    /// Validate `bug`, reporting progress to `reporter`.
    ///
    /// Returns a report for every run that reaches a verdict, including build
    /// and compile failures. Provisioning errors and container errors raised
    /// while compiling are returned as `Err`, after the container (if any)
    /// has been destroyed.
    pub fn run(&self, bug: &Bug, reporter: &mut dyn Reporter) -> Result<ValidationReport> {
        let mut run = ValidationRun::new(bug);
        info!(bug = %bug.name, tag = %bug.build_instructions.tag, "Validating bug");

        run.enter(ValidationPhase::Building);
        // Always rebuild; the image layer cache keeps this cheap.
        if let Err(e) = self.gateway.build(bug.build_instructions(), true, true) {
            warn!(bug = %bug.name, error = %e, "Failed to build bug");
            reporter.message(&format!("failed to build bug: {}", bug.name));
            return Ok(run.finish(ValidationOutcome::BuildFailed {
                reason: e.to_string(),
            }));
        }

        run.enter(ValidationPhase::Provisioning);
        let container = self.provisioner.provision(bug.build_instructions())?;
        let mut guard = ContainerGuard::new(container);
        run.container = Some(guard.id().to_string());
        debug!(bug = %bug.name, container = %guard.id(), "Provisioned container");

        let exercised = self.exercise(bug, &mut guard, &mut run, reporter);

        run.enter(ValidationPhase::Destroying);
        let released = guard.release();

        match (exercised, released) {
            (Ok(outcome), Err(e)) if outcome.is_reproduced() => Err(e.into()),
            (Ok(outcome), released) => {
                if let Err(destroy_err) = released {
                    warn!(
                        bug = %bug.name,
                        container = %guard.id(),
                        error = %destroy_err,
                        outcome = outcome.label(),
                        "Failed to destroy container after failed validation"
                    );
                }
                let report = run.finish(outcome);
                info!(
                    bug = %report.bug,
                    outcome = report.outcome.label(),
                    verdict = report.verdict(),
                    "Validation finished"
                );
                Ok(report)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(destroy_err)) => {
                warn!(
                    bug = %bug.name,
                    container = %guard.id(),
                    error = %destroy_err,
                    "Failed to destroy container after validation error"
                );
                Err(e)
            }
        }
    }

    /// Compile and run the harness inside a live container.
    fn exercise(
        &self,
        bug: &Bug,
        container: &mut ContainerGuard,
        run: &mut ValidationRun,
        reporter: &mut dyn Reporter,
    ) -> Result<ValidationOutcome> {
        run.enter(ValidationPhase::Compiling);
        reporter.task_start(COMPILE_TASK);
        let compiled = match container.compile(bug.compile_instructions()) {
            Ok(compiled) => compiled,
            Err(e) => {
                reporter.task_end(COMPILE_TASK, "ERROR");
                return Err(e.into());
            }
        };

        if !compiled.successful {
            reporter.task_end(COMPILE_TASK, "FAIL");
            reporter.diagnostic(&format_diagnostic(&compiled.response.output));
            warn!(bug = %bug.name, exit_code = ?compiled.response.exit_code, "Compilation failed");
            let output = compiled.response.output.clone();
            run.compile = Some(compiled);
            return Ok(ValidationOutcome::CompileFailed { output });
        }
        reporter.task_end(COMPILE_TASK, "OK");
        run.compile = Some(compiled);

        run.enter(ValidationPhase::Testing);
        let harness = bug.harness();
        for test in harness.passing() {
            let record = self.run_test(container, &test, Expectation::Pass, reporter);
            run.tests.push(record);
        }
        for test in harness.failing() {
            let record = self.run_test(container, &test, Expectation::Fail, reporter);
            run.tests.push(record);
        }

        let mismatches = run.tests.iter().filter(|t| !t.matches_expectation()).count();
        if mismatches == 0 {
            Ok(ValidationOutcome::Reproduced)
        } else {
            Ok(ValidationOutcome::Mismatched { mismatches })
        }
    }

    /// Run one test; an execution error is recorded as a mismatch so the
    /// remaining tests still run.
    fn run_test(
        &self,
        container: &mut ContainerGuard,
        test: &TestCase,
        expected: Expectation,
        reporter: &mut dyn Reporter,
    ) -> TestRecord {
        let task = format!("Running test: {}", test.name);
        reporter.task_start(&task);

        let record = match container.execute(test) {
            Ok(outcome) => TestRecord::observed(test, expected, outcome),
            Err(e) => {
                warn!(test = %test.name, error = %e, "Test execution failed");
                TestRecord::errored(test, expected, e.to_string())
            }
        };

        reporter.task_end(&task, record.status_label());
        if !record.matches_expectation() {
            reporter.diagnostic(&format_diagnostic(record.diagnostic_text()));
        }
        record
    }
}

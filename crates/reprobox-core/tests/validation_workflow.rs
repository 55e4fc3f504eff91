//! End-to-end validation workflow against the in-memory fakes.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use reprobox_core::fakes::{Call, CallLog, FakeBuildGateway, FakeProvisioner, RecordingReporter};
use reprobox_core::{
    Bug, BugManager, BugRegistry, BuildInstructions, CompileInstructions, ContainerError, Dataset,
    ExplicitTest, ExplicitTestSuite, NumberedTestSuite, ReproboxError, ValidationOutcome,
    ValidationPhase,
};

const TAG: &str = "reprobox/demo:overflow";

/// Two expected-passing tests (`p1`, `p2`) and one expected-failing (`n1`).
fn overflow_bug() -> Bug {
    Bug::new(
        "demo:overflow",
        BuildInstructions::new(TAG, "overflow/Dockerfile", "overflow"),
        CompileInstructions::new("make", "/experiment/src"),
        NumberedTestSuite::new("./test.sh __ID__", 2, 1)
            .in_context("/experiment")
            .into(),
    )
}

fn explicit_bug() -> Bug {
    let suite = ExplicitTestSuite::new(
        vec![ExplicitTest::new("unit", "cargo test --lib")],
        vec![ExplicitTest::new("regression", "cargo test --test issue_42")],
    );
    Bug::new(
        "demo:regression",
        BuildInstructions::new("reprobox/demo:regression", "regression/Dockerfile", "regression"),
        CompileInstructions::new("cargo build", "/experiment"),
        suite.into(),
    )
}

fn manager(gateway: FakeBuildGateway, provisioner: FakeProvisioner) -> BugManager {
    let dataset = Dataset::new("demo", vec![overflow_bug(), explicit_bug()]).unwrap();
    BugManager::new(
        BugRegistry::new().with_source(dataset),
        Arc::new(gateway),
        Arc::new(provisioner),
    )
}

fn count(log: &CallLog, pred: impl Fn(&Call) -> bool) -> usize {
    log.count(pred)
}

fn destroys(log: &CallLog) -> usize {
    count(log, |c| matches!(c, Call::Destroy { .. }))
}

fn provisions(log: &CallLog) -> usize {
    count(log, |c| matches!(c, Call::Provision { .. }))
}

#[test]
fn reproduced_bug_validates_without_diagnostics() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone()).test_fails("n1", "Segmentation fault");
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let mut reporter = RecordingReporter::new();
    let report = mgr.validate_with(bug, &mut reporter).unwrap();

    assert!(report.verdict());
    assert_eq!(report.outcome, ValidationOutcome::Reproduced);
    assert!(reporter.diagnostics().is_empty());
    assert_eq!(
        reporter.task_results(),
        vec![
            ("Compiling", "OK"),
            ("Running test: p1", "OK"),
            ("Running test: p2", "OK"),
            ("Running test: n1", "OK"),
        ]
    );
    assert_eq!(destroys(&log), 1);
    assert_eq!(
        report.phases,
        vec![
            ValidationPhase::Idle,
            ValidationPhase::Building,
            ValidationPhase::Provisioning,
            ValidationPhase::Compiling,
            ValidationPhase::Testing,
            ValidationPhase::Destroying,
            ValidationPhase::Done,
        ]
    );
}

#[test]
fn build_is_always_forced_and_quiet() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone()).test_fails("n1", "");
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    mgr.validate(bug, false).unwrap();

    assert_eq!(
        log.calls().first(),
        Some(&Call::Build {
            tag: TAG.to_string(),
            force: true,
            quiet: true,
        })
    );
}

#[test]
fn unexpected_failure_emits_one_diagnostic() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone())
        .test_fails("p2", "assertion failed\n  at main.c:12")
        .test_fails("n1", "");
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let mut reporter = RecordingReporter::new();
    let report = mgr.validate_with(bug, &mut reporter).unwrap();

    assert!(!report.verdict());
    assert_eq!(report.outcome, ValidationOutcome::Mismatched { mismatches: 1 });
    assert_eq!(
        reporter.diagnostics(),
        vec!["\n    assertion failed\n      at main.c:12"]
    );
    assert!(reporter
        .task_results()
        .contains(&("Running test: p2", "UNEXPECTED: FAIL")));
    assert_eq!(destroys(&log), 1);
}

#[test]
fn diagnostics_follow_harness_order() {
    let log = CallLog::new();
    // n1 unexpectedly passes and p1 unexpectedly fails.
    let provisioner = FakeProvisioner::new(log.clone())
        .test_passes("n1", "no crash")
        .test_fails("p1", "wrong answer");
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let mut reporter = RecordingReporter::new();
    let report = mgr.validate_with(bug, &mut reporter).unwrap();

    assert_eq!(log.executed_tests(), vec!["p1", "p2", "n1"]);
    assert_eq!(
        reporter.diagnostics(),
        vec!["\n    wrong answer", "\n    no crash"]
    );
    let mismatched: Vec<&str> = report.mismatches().map(|t| t.test.as_str()).collect();
    assert_eq!(mismatched, vec!["p1", "n1"]);
}

#[test]
fn build_failure_never_provisions() {
    let log = CallLog::new();
    let gateway = FakeBuildGateway::new(log.clone()).with_broken_build(TAG);
    let mgr = manager(gateway, FakeProvisioner::new(log.clone()));
    let bug = mgr.get("demo:overflow").unwrap();

    let mut reporter = RecordingReporter::new();
    let report = mgr.validate_with(bug, &mut reporter).unwrap();

    assert!(!report.verdict());
    assert!(matches!(report.outcome, ValidationOutcome::BuildFailed { .. }));
    assert_eq!(provisions(&log), 0);
    assert_eq!(count(&log, |c| matches!(c, Call::Compile { .. })), 0);
    assert_eq!(count(&log, |c| matches!(c, Call::Execute { .. })), 0);
    assert_eq!(destroys(&log), 0);
    assert_eq!(
        reporter.messages(),
        vec!["failed to build bug: demo:overflow"]
    );
    assert_eq!(report.phases.last(), Some(&ValidationPhase::Failed));
    assert!(!report.reached(ValidationPhase::Provisioning));
}

#[test]
fn compile_error_destroys_container_and_propagates() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone()).compile_errors("exec format error");
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let err = mgr.validate(bug, false).unwrap_err();

    assert!(matches!(
        err,
        ReproboxError::Container(ContainerError::Exec { .. })
    ));
    assert_eq!(destroys(&log), 1);
    assert_eq!(count(&log, |c| matches!(c, Call::Execute { .. })), 0);
}

#[test]
fn compile_error_wins_over_destroy_error() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone())
        .compile_errors("exec format error")
        .destroy_fails();
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let err = mgr.validate(bug, false).unwrap_err();

    assert!(matches!(
        err,
        ReproboxError::Container(ContainerError::Exec { .. })
    ));
    assert_eq!(destroys(&log), 1);
}

#[test]
fn destroy_error_after_success_surfaces() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone())
        .test_fails("n1", "")
        .destroy_fails();
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let err = mgr.validate(bug, false).unwrap_err();

    assert!(matches!(
        err,
        ReproboxError::Container(ContainerError::Destroy { .. })
    ));
    assert_eq!(destroys(&log), 1);
}

#[test]
fn compile_failure_wins_over_destroy_error() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone())
        .compile_fails("error: expected ';'")
        .destroy_fails();
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let report = mgr.validate_report(bug, false).unwrap();

    assert!(!report.verdict());
    assert!(matches!(report.outcome, ValidationOutcome::CompileFailed { .. }));
    assert_eq!(report.phases.last(), Some(&ValidationPhase::Failed));
    assert_eq!(destroys(&log), 1);
    assert!(!mgr.validate(bug, false).unwrap());
}

#[test]
fn mismatch_wins_over_destroy_error() {
    let log = CallLog::new();
    // n1 passes, so the bug does not reproduce.
    let provisioner = FakeProvisioner::new(log.clone()).destroy_fails();
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let report = mgr.validate_report(bug, false).unwrap();

    assert_eq!(report.outcome, ValidationOutcome::Mismatched { mismatches: 1 });
    assert_eq!(log.executed_tests(), vec!["p1", "p2", "n1"]);
    assert_eq!(destroys(&log), 1);
}

#[test]
fn compile_failure_skips_tests() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone()).compile_fails("main.c:3: error: expected ';'");
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let mut reporter = RecordingReporter::new();
    let report = mgr.validate_with(bug, &mut reporter).unwrap();

    assert!(!report.verdict());
    assert_eq!(
        report.outcome,
        ValidationOutcome::CompileFailed {
            output: "main.c:3: error: expected ';'".to_string()
        }
    );
    assert!(report.tests.is_empty());
    assert_eq!(count(&log, |c| matches!(c, Call::Execute { .. })), 0);
    assert_eq!(destroys(&log), 1);
    assert_eq!(reporter.task_results(), vec![("Compiling", "FAIL")]);
    assert_eq!(report.phases.last(), Some(&ValidationPhase::Failed));
    assert!(report.reached(ValidationPhase::Destroying));
    assert!(!report.reached(ValidationPhase::Testing));
}

#[test]
fn test_execution_error_is_a_mismatch_and_run_continues() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone())
        .test_errors("p1", "container is not running")
        .test_fails("n1", "");
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let mut reporter = RecordingReporter::new();
    let report = mgr.validate_with(bug, &mut reporter).unwrap();

    assert!(!report.verdict());
    assert_eq!(log.executed_tests(), vec!["p1", "p2", "n1"]);
    assert_eq!(report.tests[0].passed, None);
    assert!(report.tests[0]
        .error
        .as_deref()
        .unwrap()
        .contains("container is not running"));
    assert!(reporter.task_results().contains(&("Running test: p1", "ERROR")));
    assert_eq!(reporter.diagnostics().len(), 1);
    assert_eq!(destroys(&log), 1);
}

#[test]
fn panic_during_testing_still_destroys_container() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone()).test_panics("p2");
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);

    let result = catch_unwind(AssertUnwindSafe(|| {
        let bug = mgr.get("demo:overflow").unwrap();
        mgr.validate(bug, false)
    }));

    assert!(result.is_err());
    assert_eq!(destroys(&log), 1);
}

#[test]
fn provision_error_propagates() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone()).provision_fails();
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let err = mgr.validate(bug, false).unwrap_err();

    assert!(matches!(err, ReproboxError::Provision(_)));
    assert_eq!(destroys(&log), 0);
}

#[test]
fn unknown_bug_never_reaches_gateway() {
    let log = CallLog::new();
    let mgr = manager(FakeBuildGateway::new(log.clone()), FakeProvisioner::new(log.clone()));

    let err = mgr.get("demo:missing").unwrap_err();

    assert!(matches!(err, ReproboxError::BugNotFound(ref name) if name == "demo:missing"));
    assert!(log.calls().is_empty());
}

#[test]
fn explicit_harness_runs_named_tests() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone()).test_fails("regression", "panicked");
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:regression").unwrap();

    assert!(mgr.validate(bug, false).unwrap());
    assert_eq!(log.executed_tests(), vec!["unit", "regression"]);
}

#[test]
fn validate_all_collects_verdicts_and_errors() {
    let log = CallLog::new();
    // The overflow bug mismatches (n1 passes); the regression bug reproduces.
    let provisioner = FakeProvisioner::new(log.clone()).test_fails("regression", "panicked");
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);

    let summary = mgr.validate_all(false);

    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.validated_count(), 1);
    assert_eq!(summary.failed_count(), 1);
    assert_eq!(summary.errored_count(), 0);
    assert!(!summary.all_validated());
    assert_eq!(destroys(&log), 2);
}

#[test]
fn uninstall_is_idempotent_with_force() {
    let log = CallLog::new();
    let gateway = FakeBuildGateway::new(log.clone()).with_installed(TAG);
    let mgr = manager(gateway, FakeProvisioner::new(log.clone()));
    let bug = mgr.get("demo:overflow").unwrap();

    assert!(mgr.is_installed(bug));
    mgr.uninstall(bug, true, false).unwrap();
    mgr.uninstall(bug, true, false).unwrap();
    assert!(!mgr.is_installed(bug));
    assert!(mgr.uninstall(bug, false, false).is_err());
}

#[test]
fn report_serializes_to_json() {
    let log = CallLog::new();
    let provisioner = FakeProvisioner::new(log.clone()).test_fails("n1", "boom");
    let mgr = manager(FakeBuildGateway::new(log.clone()), provisioner);
    let bug = mgr.get("demo:overflow").unwrap();

    let report = mgr.validate_report(bug, false).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["bug"], "demo:overflow");
    assert_eq!(json["outcome"]["kind"], "reproduced");
    assert_eq!(json["tests"].as_array().unwrap().len(), 3);
    assert_eq!(json["container"], "fake-0");
}

//! In-memory fakes for the collaborator contracts (testing only)
//!
//! Provides `FakeBuildGateway`, `FakeProvisioner` and `RecordingReporter`
//! that satisfy the contracts without Docker. Every interaction is appended
//! to a shared [`CallLog`] so tests can assert on ordering and counts.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{
    BuildInstructions, CompileInstructions, CompileResult, ExecResponse, TestCase, TestOutcome,
};
use crate::gateway::{
    BuildError, BuildGateway, Container, ContainerError, ContainerProvisioner, ProvisionError,
};
use crate::validation::Reporter;

// ---------------------------------------------------------------------------
// CallLog
// ---------------------------------------------------------------------------

/// One recorded interaction with a fake collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Build { tag: String, force: bool, quiet: bool },
    Uninstall { tag: String, force: bool, noprune: bool },
    Download { tag: String, force: bool },
    Upload { tag: String },
    IsInstalled { tag: String },
    Provision { tag: String },
    Compile { container: String },
    Execute { container: String, test: String },
    Destroy { container: String },
}

/// Shared, ordered log of calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    /// Names of executed tests, in order.
    pub fn executed_tests(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Execute { test, .. } => Some(test.clone()),
                _ => None,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// FakeBuildGateway
// ---------------------------------------------------------------------------

/// Build gateway backed by a set of "installed" tags.
#[derive(Debug, Default)]
pub struct FakeBuildGateway {
    log: CallLog,
    installed: Mutex<BTreeSet<String>>,
    broken: BTreeSet<String>,
    unpublished: BTreeSet<String>,
}

impl FakeBuildGateway {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Builds of `tag` fail with `BuildError::BuildFailed`.
    pub fn with_broken_build(mut self, tag: &str) -> Self {
        self.broken.insert(tag.to_string());
        self
    }

    pub fn with_installed(self, tag: &str) -> Self {
        self.installed.lock().unwrap().insert(tag.to_string());
        self
    }

    /// Downloads and uploads of `tag` fail.
    pub fn with_unpublished(mut self, tag: &str) -> Self {
        self.unpublished.insert(tag.to_string());
        self
    }

    fn installed(&self, tag: &str) -> bool {
        self.installed.lock().unwrap().contains(tag)
    }
}

impl BuildGateway for FakeBuildGateway {
    fn build(&self, instructions: &BuildInstructions, force: bool, quiet: bool) -> Result<(), BuildError> {
        let tag = instructions.tag.clone();
        self.log.record(Call::Build {
            tag: tag.clone(),
            force,
            quiet,
        });
        if self.broken.contains(&tag) {
            return Err(BuildError::BuildFailed {
                tag,
                reason: "scripted build failure".to_string(),
            });
        }
        self.installed.lock().unwrap().insert(tag);
        Ok(())
    }

    fn uninstall(
        &self,
        instructions: &BuildInstructions,
        force: bool,
        noprune: bool,
    ) -> Result<(), BuildError> {
        let tag = instructions.tag.clone();
        self.log.record(Call::Uninstall {
            tag: tag.clone(),
            force,
            noprune,
        });
        let removed = self.installed.lock().unwrap().remove(&tag);
        if !removed && !force {
            return Err(BuildError::NotInstalled { tag });
        }
        Ok(())
    }

    fn download(&self, instructions: &BuildInstructions, force: bool) -> bool {
        let tag = instructions.tag.clone();
        self.log.record(Call::Download {
            tag: tag.clone(),
            force,
        });
        if self.unpublished.contains(&tag) {
            return false;
        }
        self.installed.lock().unwrap().insert(tag);
        true
    }

    fn upload(&self, instructions: &BuildInstructions) -> bool {
        self.log.record(Call::Upload {
            tag: instructions.tag.clone(),
        });
        !self.unpublished.contains(&instructions.tag) && self.installed(&instructions.tag)
    }

    fn is_installed(&self, instructions: &BuildInstructions) -> bool {
        self.log.record(Call::IsInstalled {
            tag: instructions.tag.clone(),
        });
        self.installed(&instructions.tag)
    }
}

// ---------------------------------------------------------------------------
// FakeProvisioner / FakeContainer
// ---------------------------------------------------------------------------

/// Scripted compile behaviour.
#[derive(Debug, Clone, Default)]
pub enum CompileBehaviour {
    #[default]
    Succeed,
    /// The compiler ran and reported failure with this output.
    Fail(String),
    /// The container could not run the compiler at all.
    Error(String),
}

/// Scripted behaviour of a single test.
#[derive(Debug, Clone)]
pub enum TestBehaviour {
    Pass(String),
    Fail(String),
    Error(String),
    Panic,
}

/// What every container handed out by a [`FakeProvisioner`] does.
///
/// Tests without a scripted behaviour pass with empty output.
#[derive(Debug, Clone, Default)]
pub struct ContainerScript {
    pub compile: CompileBehaviour,
    pub tests: HashMap<String, TestBehaviour>,
    pub destroy_error: bool,
}

/// Provisioner handing out scripted in-memory containers.
#[derive(Debug, Default)]
pub struct FakeProvisioner {
    log: CallLog,
    script: ContainerScript,
    fail_provision: bool,
    next_id: AtomicUsize,
}

impl FakeProvisioner {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn compile_fails(mut self, output: &str) -> Self {
        self.script.compile = CompileBehaviour::Fail(output.to_string());
        self
    }

    pub fn compile_errors(mut self, reason: &str) -> Self {
        self.script.compile = CompileBehaviour::Error(reason.to_string());
        self
    }

    pub fn test_passes(self, test: &str, output: &str) -> Self {
        self.scripted(test, TestBehaviour::Pass(output.to_string()))
    }

    pub fn test_fails(self, test: &str, output: &str) -> Self {
        self.scripted(test, TestBehaviour::Fail(output.to_string()))
    }

    pub fn test_errors(self, test: &str, reason: &str) -> Self {
        self.scripted(test, TestBehaviour::Error(reason.to_string()))
    }

    pub fn test_panics(self, test: &str) -> Self {
        self.scripted(test, TestBehaviour::Panic)
    }

    pub fn destroy_fails(mut self) -> Self {
        self.script.destroy_error = true;
        self
    }

    pub fn provision_fails(mut self) -> Self {
        self.fail_provision = true;
        self
    }

    fn scripted(mut self, test: &str, behaviour: TestBehaviour) -> Self {
        self.script.tests.insert(test.to_string(), behaviour);
        self
    }
}

impl ContainerProvisioner for FakeProvisioner {
    fn provision(&self, instructions: &BuildInstructions) -> Result<Box<dyn Container>, ProvisionError> {
        self.log.record(Call::Provision {
            tag: instructions.tag.clone(),
        });
        if self.fail_provision {
            return Err(ProvisionError::StartFailed {
                tag: instructions.tag.clone(),
                reason: "scripted provision failure".to_string(),
            });
        }
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(FakeContainer {
            id: format!("fake-{n}"),
            log: self.log.clone(),
            script: self.script.clone(),
            destroyed: false,
        }))
    }
}

/// In-memory container following a [`ContainerScript`].
#[derive(Debug)]
pub struct FakeContainer {
    id: String,
    log: CallLog,
    script: ContainerScript,
    destroyed: bool,
}

impl Container for FakeContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn compile(&mut self, _instructions: &CompileInstructions) -> Result<CompileResult, ContainerError> {
        self.log.record(Call::Compile {
            container: self.id.clone(),
        });
        match &self.script.compile {
            CompileBehaviour::Succeed => Ok(CompileResult::from_response(ExecResponse::new(0, ""))),
            CompileBehaviour::Fail(output) => {
                Ok(CompileResult::from_response(ExecResponse::new(2, output.clone())))
            }
            CompileBehaviour::Error(reason) => Err(ContainerError::Exec {
                container: self.id.clone(),
                task: "compile".to_string(),
                reason: reason.clone(),
            }),
        }
    }

    fn execute(&mut self, test: &TestCase) -> Result<TestOutcome, ContainerError> {
        self.log.record(Call::Execute {
            container: self.id.clone(),
            test: test.name.clone(),
        });
        match self.script.tests.get(&test.name) {
            None => Ok(TestOutcome::from_response(ExecResponse::new(0, ""))),
            Some(TestBehaviour::Pass(output)) => {
                Ok(TestOutcome::from_response(ExecResponse::new(0, output.clone())))
            }
            Some(TestBehaviour::Fail(output)) => {
                Ok(TestOutcome::from_response(ExecResponse::new(1, output.clone())))
            }
            Some(TestBehaviour::Error(reason)) => Err(ContainerError::Exec {
                container: self.id.clone(),
                task: format!("test {}", test.name),
                reason: reason.clone(),
            }),
            Some(TestBehaviour::Panic) => panic!("scripted panic in test {}", test.name),
        }
    }

    fn destroy(&mut self) -> Result<(), ContainerError> {
        self.log.record(Call::Destroy {
            container: self.id.clone(),
        });
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        if self.script.destroy_error {
            return Err(ContainerError::Destroy {
                container: self.id.clone(),
                reason: "scripted destroy failure".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// One reporter event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    TaskStart(String),
    TaskEnd { task: String, status: String },
    Diagnostic(String),
    Message(String),
}

/// Reporter that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<ReportEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Diagnostic(block) => Some(block.as_str()),
                _ => None,
            })
            .collect()
    }

    /// `(task, status)` pairs, in order.
    pub fn task_results(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::TaskEnd { task, status } => Some((task.as_str(), status.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Message(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn task_start(&mut self, task: &str) {
        self.events.push(ReportEvent::TaskStart(task.to_string()));
    }

    fn task_end(&mut self, task: &str, status: &str) {
        self.events.push(ReportEvent::TaskEnd {
            task: task.to_string(),
            status: status.to_string(),
        });
    }

    fn diagnostic(&mut self, block: &str) {
        self.events.push(ReportEvent::Diagnostic(block.to_string()));
    }

    fn message(&mut self, text: &str) {
        self.events.push(ReportEvent::Message(text.to_string()));
    }
}

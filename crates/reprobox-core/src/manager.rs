//! Bug manager: the access point that supplies bugs to validate.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{Bug, Result};
use crate::gateway::{BuildError, BuildGateway, ContainerProvisioner};
use crate::registry::BugRegistry;
use crate::validation::{
    BatchSummary, ConsoleReporter, Reporter, SilentReporter, ValidationFailure, ValidationReport,
    Validator,
};

/// Facade over the registry, the build gateway and the container provisioner.
///
/// Image lifecycle operations are pass-throughs to the gateway keyed on the
/// bug's build instructions.
pub struct BugManager {
    registry: BugRegistry,
    gateway: Arc<dyn BuildGateway>,
    provisioner: Arc<dyn ContainerProvisioner>,
}

impl BugManager {
    pub fn new(
        registry: BugRegistry,
        gateway: Arc<dyn BuildGateway>,
        provisioner: Arc<dyn ContainerProvisioner>,
    ) -> Self {
        Self {
            registry,
            gateway,
            provisioner,
        }
    }

    pub fn registry(&self) -> &BugRegistry {
        &self.registry
    }

    /// Resolve a bug by identifier.
    pub fn get(&self, name: &str) -> Result<&Bug> {
        self.registry.resolve(name)
    }

    pub fn bugs(&self) -> impl Iterator<Item = &Bug> + '_ {
        self.registry.bugs()
    }

    pub fn is_installed(&self, bug: &Bug) -> bool {
        self.registry.is_installed(bug, self.gateway.as_ref())
    }

    pub fn build(&self, bug: &Bug, force: bool, quiet: bool) -> std::result::Result<(), BuildError> {
        self.gateway.build(bug.build_instructions(), force, quiet)
    }

    pub fn uninstall(
        &self,
        bug: &Bug,
        force: bool,
        noprune: bool,
    ) -> std::result::Result<(), BuildError> {
        self.gateway.uninstall(bug.build_instructions(), force, noprune)
    }

    pub fn download(&self, bug: &Bug, force: bool) -> bool {
        self.gateway.download(bug.build_instructions(), force)
    }

    pub fn upload(&self, bug: &Bug) -> bool {
        self.gateway.upload(bug.build_instructions())
    }

    /// Check that `bug` builds and produces its expected test outcomes.
    ///
    /// With `verbose`, task lines and mismatch diagnostics are printed to
    /// stdout.
    pub fn validate(&self, bug: &Bug, verbose: bool) -> Result<bool> {
        Ok(self.validate_report(bug, verbose)?.verdict())
    }

    /// Like [`validate`](Self::validate), returning the full report.
    pub fn validate_report(&self, bug: &Bug, verbose: bool) -> Result<ValidationReport> {
        if verbose {
            self.validate_with(bug, &mut ConsoleReporter::stdout())
        } else {
            self.validate_with(bug, &mut SilentReporter)
        }
    }

    /// Validate with a caller-supplied reporter.
    pub fn validate_with(&self, bug: &Bug, reporter: &mut dyn Reporter) -> Result<ValidationReport> {
        Validator::new(self.gateway.as_ref(), self.provisioner.as_ref()).run(bug, reporter)
    }

    /// Validate every registered bug, in registry order.
    pub fn validate_all(&self, verbose: bool) -> BatchSummary {
        if verbose {
            self.validate_all_with(&mut ConsoleReporter::stdout())
        } else {
            self.validate_all_with(&mut SilentReporter)
        }
    }

    pub fn validate_all_with(&self, reporter: &mut dyn Reporter) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for bug in self.registry.bugs() {
            match self.validate_with(bug, reporter) {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    warn!(bug = %bug.name, error = %e, "Validation errored");
                    summary.errors.push(ValidationFailure {
                        bug: bug.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(
            validated = summary.validated_count(),
            failed = summary.failed_count(),
            errored = summary.errored_count(),
            "Batch validation finished"
        );
        summary
    }
}

impl std::fmt::Debug for BugManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BugManager")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

//! Collaborator contracts consumed by the validation workflow.
//!
//! - [`BuildGateway`] builds, installs and removes bug images.
//! - [`ContainerProvisioner`] starts a [`Container`] from an installed image.
//! - [`Container`] compiles the subject program and runs tests.
//!
//! Every contract reports failures through a closed error enum from
//! [`error`], so callers match on the kind of failure rather than on
//! backend-specific types.

pub mod error;

pub use error::{BuildError, ContainerError, ProvisionError};

use crate::domain::{BuildInstructions, CompileInstructions, CompileResult, TestCase, TestOutcome};

/// Image lifecycle operations keyed on [`BuildInstructions`].
pub trait BuildGateway: Send + Sync {
    /// Build the image. With `force = false` an installed image is left as is.
    fn build(
        &self,
        instructions: &BuildInstructions,
        force: bool,
        quiet: bool,
    ) -> Result<(), BuildError>;

    /// Remove the image. With `force = true` a missing image is not an error.
    fn uninstall(
        &self,
        instructions: &BuildInstructions,
        force: bool,
        noprune: bool,
    ) -> Result<(), BuildError>;

    /// Fetch the image from its registry. Returns `true` on success.
    fn download(&self, instructions: &BuildInstructions, force: bool) -> bool;

    /// Publish the image to its registry. Returns `true` on success.
    fn upload(&self, instructions: &BuildInstructions) -> bool;

    fn is_installed(&self, instructions: &BuildInstructions) -> bool;
}

/// Starts containers from installed images.
pub trait ContainerProvisioner: Send + Sync {
    fn provision(
        &self,
        instructions: &BuildInstructions,
    ) -> Result<Box<dyn Container>, ProvisionError>;
}

/// A provisioned, running instance of a bug image.
pub trait Container: Send {
    /// Backend identifier of this container.
    fn id(&self) -> &str;

    fn compile(
        &mut self,
        instructions: &CompileInstructions,
    ) -> Result<CompileResult, ContainerError>;

    fn execute(&mut self, test: &TestCase) -> Result<TestOutcome, ContainerError>;

    /// Tear the container down. Calling it again is a no-op.
    fn destroy(&mut self) -> Result<(), ContainerError>;
}

//! Scoped ownership of a provisioned container.

use tracing::{debug, warn};

use crate::domain::{CompileInstructions, CompileResult, TestCase, TestOutcome};
use crate::gateway::{Container, ContainerError};

/// Owns a container from provisioning until release.
///
/// [`release`](Self::release) destroys the container exactly once; any later
/// call is a no-op. If the guard is dropped while still holding the container
/// (early return, `?`, or unwinding panic) it is destroyed in `Drop`.
pub struct ContainerGuard {
    slot: Option<Box<dyn Container>>,
    id: String,
}

impl ContainerGuard {
    pub fn new(container: Box<dyn Container>) -> Self {
        let id = container.id().to_string();
        Self {
            slot: Some(container),
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_live(&self) -> bool {
        self.slot.is_some()
    }

    fn live(&mut self) -> Result<&mut (dyn Container + 'static), ContainerError> {
        match self.slot.as_deref_mut() {
            Some(container) => Ok(container),
            None => Err(ContainerError::Destroyed {
                container: self.id.clone(),
            }),
        }
    }

    pub fn compile(
        &mut self,
        instructions: &CompileInstructions,
    ) -> Result<CompileResult, ContainerError> {
        self.live()?.compile(instructions)
    }

    pub fn execute(&mut self, test: &TestCase) -> Result<TestOutcome, ContainerError> {
        self.live()?.execute(test)
    }

    /// Destroy the container if it is still held.
    pub fn release(&mut self) -> Result<(), ContainerError> {
        match self.slot.take() {
            Some(mut container) => {
                debug!(container = %self.id, "Destroying container");
                container.destroy()
            }
            None => Ok(()),
        }
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if let Some(mut container) = self.slot.take() {
            warn!(container = %self.id, "Container released without explicit teardown");
            if let Err(e) = container.destroy() {
                warn!(container = %self.id, error = %e, "Failed to destroy container");
            }
        }
    }
}

impl std::fmt::Debug for ContainerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerGuard")
            .field("id", &self.id)
            .field("live", &self.is_live())
            .finish()
    }
}

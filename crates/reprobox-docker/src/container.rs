//! Docker-backed [`ContainerProvisioner`] and [`Container`].

use std::time::Duration;

use reprobox_core::{
    BuildInstructions, CompileInstructions, CompileResult, Container, ContainerError,
    ContainerProvisioner, ExecResponse, ProvisionError, TestCase, TestOutcome,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::{self, DockerClient, CONTAINER_PREFIX};
use crate::error::DockerError;

/// Time allowed for `docker run` and `docker rm`.
const LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Starts one throwaway container per validation.
#[derive(Debug, Clone, Default)]
pub struct DockerProvisioner {
    client: DockerClient,
}

impl DockerProvisioner {
    pub fn new(client: DockerClient) -> Self {
        Self { client }
    }
}

/// Unique container name.
pub fn container_name() -> String {
    format!("{CONTAINER_PREFIX}{}", Uuid::new_v4().simple())
}

impl ContainerProvisioner for DockerProvisioner {
    fn provision(&self, instructions: &BuildInstructions) -> Result<Box<dyn Container>, ProvisionError> {
        let tag = &instructions.tag;
        if !self.client.image_exists(tag) {
            return Err(ProvisionError::ImageMissing { tag: tag.clone() });
        }

        let name = container_name();
        if let Err(e) = self
            .client
            .run_checked(&client::run_args(&name, tag), Some(LIFECYCLE_TIMEOUT))
        {
            // `docker run` may have created the container before failing.
            if let Err(rm_err) = self
                .client
                .run_checked(&client::rm_args(&name), Some(LIFECYCLE_TIMEOUT))
            {
                warn!(container = %name, error = %rm_err, "Failed to remove container after failed start");
            }
            return Err(ProvisionError::StartFailed {
                tag: tag.clone(),
                reason: e.to_string(),
            });
        }

        info!(tag = %tag, container = %name, "Started container");
        Ok(Box::new(DockerContainer {
            client: self.client.clone(),
            name,
            destroyed: false,
        }))
    }
}

/// A running container, addressed by name.
#[derive(Debug)]
pub struct DockerContainer {
    client: DockerClient,
    name: String,
    destroyed: bool,
}

impl DockerContainer {
    fn exec(
        &self,
        task: &str,
        command: &str,
        context: &str,
        time_limit_secs: u64,
    ) -> Result<ExecResponse, ContainerError> {
        if self.destroyed {
            return Err(ContainerError::Destroyed {
                container: self.name.clone(),
            });
        }

        let limit = (time_limit_secs > 0).then(|| Duration::from_secs(time_limit_secs));
        debug!(container = %self.name, task = %task, command = %command, "Executing");
        let output = self
            .client
            .run(&client::exec_args(&self.name, context, command), limit)
            .map_err(|e| ContainerError::Exec {
                container: self.name.clone(),
                task: task.to_string(),
                reason: e.to_string(),
            })?;

        let text = output.combined_text();
        if output.timed_out {
            warn!(container = %self.name, task = %task, time_limit_secs, "Time limit exceeded");
            // Killing the client leaves the command running in the container.
            if let Err(e) = self
                .client
                .run(&client::kill_all_args(&self.name), Some(LIFECYCLE_TIMEOUT))
            {
                warn!(container = %self.name, task = %task, error = %e, "Failed to stop timed-out command");
            }
            return Ok(ExecResponse::timed_out(text, output.elapsed_ms()));
        }
        Ok(ExecResponse {
            exit_code: output.code(),
            output: text,
            duration_ms: output.elapsed_ms(),
            timed_out: false,
        })
    }
}

impl Container for DockerContainer {
    fn id(&self) -> &str {
        &self.name
    }

    fn compile(&mut self, instructions: &CompileInstructions) -> Result<CompileResult, ContainerError> {
        let response = self.exec(
            "compile",
            &instructions.command,
            &instructions.context,
            instructions.time_limit_secs,
        )?;
        Ok(CompileResult::from_response(response))
    }

    fn execute(&mut self, test: &TestCase) -> Result<TestOutcome, ContainerError> {
        let task = format!("test {}", test.name);
        let response = self.exec(&task, &test.command, &test.context, test.time_limit_secs)?;
        Ok(TestOutcome::from_response(response))
    }

    fn destroy(&mut self) -> Result<(), ContainerError> {
        if self.destroyed {
            return Ok(());
        }
        let result = self
            .client
            .run_checked(&client::rm_args(&self.name), Some(LIFECYCLE_TIMEOUT));
        match result {
            Ok(_) => {}
            Err(DockerError::CommandFailed { ref stderr, .. }) if stderr.contains("No such container") => {
                debug!(container = %self.name, "Container already gone");
            }
            Err(e) => {
                return Err(ContainerError::Destroy {
                    container: self.name.clone(),
                    reason: e.to_string(),
                })
            }
        }
        self.destroyed = true;
        info!(container = %self.name, "Destroyed container");
        Ok(())
    }
}

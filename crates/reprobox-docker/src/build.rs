//! Docker-backed [`BuildGateway`].

use std::collections::HashMap;

use reprobox_core::{BuildError, BuildGateway, BuildInstructions};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{self, DockerClient, DIGEST_LABEL};
use crate::error::DockerError;

/// Installation state of one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageStatus {
    pub tag: String,
    pub installed: bool,
    /// Digest label of the installed image, if any.
    pub installed_digest: Option<String>,
    /// Digest of the current build instructions.
    pub expected_digest: String,
}

impl ImageStatus {
    /// Installed and built from the current instructions.
    pub fn is_current(&self) -> bool {
        self.installed_digest.as_deref() == Some(self.expected_digest.as_str())
    }
}

/// Builds and manages images with the Docker client.
///
/// Images named by `depends_on` are built first when their instructions are
/// known to the gateway, and pulled otherwise.
#[derive(Debug, Default)]
pub struct DockerBuildGateway {
    client: DockerClient,
    known: HashMap<String, BuildInstructions>,
}

impl DockerBuildGateway {
    pub fn new(client: DockerClient) -> Self {
        Self {
            client,
            known: HashMap::new(),
        }
    }

    /// Register instructions that dependencies can be built from.
    pub fn with_known<'a>(mut self, instructions: impl IntoIterator<Item = &'a BuildInstructions>) -> Self {
        for i in instructions {
            self.known.entry(i.tag.clone()).or_insert_with(|| i.clone());
        }
        self
    }

    pub fn client(&self) -> &DockerClient {
        &self.client
    }

    pub fn status(&self, instructions: &BuildInstructions) -> ImageStatus {
        let installed = self.client.image_exists(&instructions.tag);
        let installed_digest = if installed {
            match self.client.image_labels(&instructions.tag) {
                Ok(mut labels) => labels.remove(DIGEST_LABEL),
                Err(e) => {
                    warn!(tag = %instructions.tag, error = %e, "Failed to read image labels");
                    None
                }
            }
        } else {
            None
        };
        ImageStatus {
            tag: instructions.tag.clone(),
            installed,
            installed_digest,
            expected_digest: instructions.digest(),
        }
    }

    fn build_chain(
        &self,
        instructions: &BuildInstructions,
        force: bool,
        quiet: bool,
        chain: &mut Vec<String>,
    ) -> Result<(), BuildError> {
        let tag = &instructions.tag;
        if chain.contains(tag) {
            chain.push(tag.clone());
            return Err(BuildError::DependencyCycle {
                tag: chain[0].clone(),
                chain: chain.join(" -> "),
            });
        }
        chain.push(tag.clone());

        if !force && self.client.image_exists(tag) {
            debug!(tag = %tag, "Image already installed, skipping build");
            chain.pop();
            return Ok(());
        }

        if let Some(dependency) = &instructions.depends_on {
            self.ensure_dependency(tag, dependency, quiet, chain)?;
        }

        info!(tag = %tag, digest = %instructions.short_digest(), "Building image");
        let args = client::build_args(instructions, quiet);
        let built = if quiet {
            self.client.run_checked(&args, None).map(|_| ())
        } else {
            self.client.run_attached(&args)
        };
        built.map_err(|e| build_failure(tag, e))?;

        chain.pop();
        Ok(())
    }

    fn ensure_dependency(
        &self,
        tag: &str,
        dependency: &str,
        quiet: bool,
        chain: &mut Vec<String>,
    ) -> Result<(), BuildError> {
        if self.client.image_exists(dependency) && !chain.iter().any(|t| t == dependency) {
            return Ok(());
        }
        if let Some(known) = self.known.get(dependency) {
            debug!(tag = %tag, dependency = %dependency, "Building dependency");
            return self.build_chain(known, false, quiet, chain);
        }
        info!(tag = %tag, dependency = %dependency, "Pulling dependency");
        match self.client.run_checked(&client::pull_args(dependency), None) {
            Ok(_) => Ok(()),
            Err(DockerError::ClientNotFound(binary)) => Err(BuildError::Unavailable(format!(
                "docker client `{binary}` not found"
            ))),
            Err(e) => {
                warn!(dependency = %dependency, error = %e, "Failed to pull dependency");
                Err(BuildError::MissingDependency {
                    tag: tag.to_string(),
                    dependency: dependency.to_string(),
                })
            }
        }
    }
}

fn build_failure(tag: &str, err: DockerError) -> BuildError {
    match err {
        DockerError::ClientNotFound(_) => BuildError::Unavailable(err.to_string()),
        other => BuildError::BuildFailed {
            tag: tag.to_string(),
            reason: other.to_string(),
        },
    }
}

impl BuildGateway for DockerBuildGateway {
    fn build(&self, instructions: &BuildInstructions, force: bool, quiet: bool) -> Result<(), BuildError> {
        self.build_chain(instructions, force, quiet, &mut Vec::new())
    }

    fn uninstall(
        &self,
        instructions: &BuildInstructions,
        force: bool,
        noprune: bool,
    ) -> Result<(), BuildError> {
        let tag = &instructions.tag;
        if !self.client.image_exists(tag) {
            if force {
                debug!(tag = %tag, "Image not installed, nothing to uninstall");
                return Ok(());
            }
            return Err(BuildError::NotInstalled { tag: tag.clone() });
        }

        info!(tag = %tag, force, noprune, "Uninstalling image");
        self.client
            .run_checked(&client::rmi_args(tag, force, noprune), None)
            .map(|_| ())
            .map_err(|e| BuildError::UninstallFailed {
                tag: tag.clone(),
                reason: e.to_string(),
            })
    }

    fn download(&self, instructions: &BuildInstructions, force: bool) -> bool {
        let tag = &instructions.tag;
        if !force && self.client.image_exists(tag) {
            return true;
        }
        info!(tag = %tag, "Pulling image");
        match self.client.run_checked(&client::pull_args(tag), None) {
            Ok(_) => true,
            Err(e) => {
                warn!(tag = %tag, error = %e, "Failed to pull image");
                false
            }
        }
    }

    fn upload(&self, instructions: &BuildInstructions) -> bool {
        let tag = &instructions.tag;
        info!(tag = %tag, "Pushing image");
        match self.client.run_checked(&client::push_args(tag), None) {
            Ok(_) => true,
            Err(e) => {
                warn!(tag = %tag, error = %e, "Failed to push image");
                false
            }
        }
    }

    fn is_installed(&self, instructions: &BuildInstructions) -> bool {
        self.client.image_exists(&instructions.tag)
    }
}

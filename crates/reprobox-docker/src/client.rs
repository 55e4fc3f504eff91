//! Thin wrapper over the `docker` command-line client.
//!
//! Argument lists are built by pure functions so they can be checked without
//! a Docker daemon.

use std::collections::HashMap;
use std::ffi::OsString;
use std::process::Command;
use std::time::Duration;

use reprobox_core::{BuildInstructions, ReproboxConfig};
use tracing::debug;

use crate::error::DockerError;
use crate::process::{run_command_with_timeout, CommandOutput};
use crate::Result;

/// Label carrying the digest of the build instructions an image was built from.
pub const DIGEST_LABEL: &str = "reprobox.digest";

/// Prefix of every container name created by reprobox.
pub const CONTAINER_PREFIX: &str = "reprobox-";

/// Handle on a Docker client binary.
#[derive(Debug, Clone)]
pub struct DockerClient {
    binary: String,
    output_limit_bytes: usize,
}

impl Default for DockerClient {
    fn default() -> Self {
        Self::from_config(&ReproboxConfig::default())
    }
}

impl DockerClient {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            output_limit_bytes: reprobox_core::config::DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    pub fn from_config(config: &ReproboxConfig) -> Self {
        Self {
            binary: config.docker_binary.clone(),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Check the client binary runs at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Run the client and capture its output.
    pub fn run(&self, args: &[OsString], timeout: Option<Duration>) -> Result<CommandOutput> {
        debug!(binary = %self.binary, command = %subcommand(args), "Running docker");
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        run_command_with_timeout(cmd, timeout, self.output_limit_bytes).map_err(|e| match e {
            DockerError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                DockerError::ClientNotFound(self.binary.clone())
            }
            other => other,
        })
    }

    /// Run the client; a non-zero exit or a timeout is an error.
    pub fn run_checked(&self, args: &[OsString], timeout: Option<Duration>) -> Result<CommandOutput> {
        let output = self.run(args, timeout)?;
        if output.timed_out {
            return Err(DockerError::TimedOut {
                command: subcommand(args),
                secs: timeout.map(|t| t.as_secs()).unwrap_or_default(),
            });
        }
        if !output.status.success() {
            return Err(DockerError::CommandFailed {
                command: subcommand(args),
                code: output.code(),
                stderr: output.stderr_text(),
            });
        }
        Ok(output)
    }

    /// Run the client with stdout and stderr attached to the terminal.
    pub fn run_attached(&self, args: &[OsString]) -> Result<()> {
        debug!(binary = %self.binary, command = %subcommand(args), "Running docker attached");
        let status = Command::new(&self.binary).args(args).status().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DockerError::ClientNotFound(self.binary.clone())
            } else {
                DockerError::Io(e)
            }
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(DockerError::CommandFailed {
                command: subcommand(args),
                code: status.code(),
                stderr: String::new(),
            })
        }
    }

    pub fn image_exists(&self, tag: &str) -> bool {
        self.run(&inspect_args(tag), None)
            .map(|o| o.succeeded())
            .unwrap_or(false)
    }

    /// Labels of an installed image.
    pub fn image_labels(&self, tag: &str) -> Result<HashMap<String, String>> {
        let output = self.run_checked(&labels_args(tag), None)?;
        let labels: Option<HashMap<String, String>> =
            serde_json::from_str(output.stdout_text().trim())?;
        Ok(labels.unwrap_or_default())
    }
}

/// First argument, used to name the operation in logs and errors.
fn subcommand(args: &[OsString]) -> String {
    args.first()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn os_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    args.into_iter().map(Into::into).collect()
}

/// `docker build` for `instructions`, labelled with their digest.
pub fn build_args(instructions: &BuildInstructions, quiet: bool) -> Vec<OsString> {
    let mut args = os_args(["build", "-t"]);
    args.push(instructions.tag.clone().into());
    args.push("-f".into());
    args.push(instructions.dockerfile.clone().into());
    args.push("--label".into());
    args.push(format!("{DIGEST_LABEL}={}", instructions.digest()).into());
    for (key, value) in &instructions.arguments {
        args.push("--build-arg".into());
        args.push(format!("{key}={value}").into());
    }
    if quiet {
        args.push("--quiet".into());
    }
    args.push(instructions.context.clone().into());
    args
}

pub fn rmi_args(tag: &str, force: bool, noprune: bool) -> Vec<OsString> {
    let mut args = os_args(["rmi"]);
    if force {
        args.push("--force".into());
    }
    if noprune {
        args.push("--no-prune".into());
    }
    args.push(tag.into());
    args
}

pub fn pull_args(tag: &str) -> Vec<OsString> {
    os_args(["pull", tag])
}

pub fn push_args(tag: &str) -> Vec<OsString> {
    os_args(["push", tag])
}

pub fn inspect_args(tag: &str) -> Vec<OsString> {
    os_args(["image", "inspect", "--format", "{{.Id}}", tag])
}

pub fn labels_args(tag: &str) -> Vec<OsString> {
    os_args([
        "image",
        "inspect",
        "--format",
        "{{json .Config.Labels}}",
        tag,
    ])
}

/// Start a detached container that idles in a shell until removed.
pub fn run_args(name: &str, tag: &str) -> Vec<OsString> {
    os_args([
        "run",
        "--detach",
        "--interactive",
        "--tty",
        "--name",
        name,
        "--entrypoint",
        "/bin/sh",
        tag,
    ])
}

/// Run `command` under `/bin/sh` inside a container, stderr merged into stdout.
///
/// An empty `context` keeps the image's working directory.
pub fn exec_args(container: &str, context: &str, command: &str) -> Vec<OsString> {
    let mut args = os_args(["exec"]);
    if !context.is_empty() {
        args.push("--workdir".into());
        args.push(context.into());
    }
    args.push(container.into());
    args.extend(os_args(["/bin/sh", "-c"]));
    args.push(format!("exec 2>&1\n{command}").into());
    args
}

/// Kill every process in the container except its init, which is the idle
/// entrypoint shell started by [`run_args`].
pub fn kill_all_args(container: &str) -> Vec<OsString> {
    os_args(["exec", container, "/bin/sh", "-c", "kill -s KILL -1"])
}

pub fn rm_args(container: &str) -> Vec<OsString> {
    os_args(["rm", "--force", container])
}

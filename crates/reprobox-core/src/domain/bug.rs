//! Bug descriptors and the instructions needed to materialize them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::harness::{HarnessSpec, TestHarness};

/// Default time limit for compiling a bug inside its container.
pub const DEFAULT_COMPILE_TIME_LIMIT_SECS: u64 = 300;

/// Instructions for building the image a bug is materialized as.
///
/// The image `tag` is the key the build gateway uses to build, install and
/// locate the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInstructions {
    /// Image tag, e.g. `reprobox/manybugs:php-1`.
    pub tag: String,

    /// Path to the Dockerfile.
    pub dockerfile: PathBuf,

    /// Build context directory.
    pub context: PathBuf,

    /// Build-time arguments (`--build-arg KEY=VALUE`).
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,

    /// Tag of an image that must be installed before this one can be built.
    #[serde(default)]
    pub depends_on: Option<String>,
}

impl BuildInstructions {
    /// Create build instructions for `tag`.
    pub fn new(
        tag: impl Into<String>,
        dockerfile: impl Into<PathBuf>,
        context: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tag: tag.into(),
            dockerfile: dockerfile.into(),
            context: context.into(),
            arguments: BTreeMap::new(),
            depends_on: None,
        }
    }

    /// Add a build argument.
    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Declare an image this one is built on top of.
    pub fn with_dependency(mut self, tag: impl Into<String>) -> Self {
        self.depends_on = Some(tag.into());
        self
    }

    /// SHA-256 digest over every build input, in a fixed field order.
    ///
    /// Arguments are hashed in key order, so the digest does not depend on the
    /// order they were declared in.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.tag.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.dockerfile.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.context.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        for (key, value) in &self.arguments {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\0");
        }
        if let Some(dep) = &self.depends_on {
            hasher.update(dep.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Short form of [`digest`](Self::digest) (first 12 hex chars).
    pub fn short_digest(&self) -> String {
        self.digest().chars().take(12).collect()
    }

    /// Resolve relative Dockerfile and context paths against `base`.
    pub(crate) fn resolve_paths(&mut self, base: &Path) {
        if self.dockerfile.is_relative() {
            self.dockerfile = base.join(&self.dockerfile);
        }
        if self.context.is_relative() {
            self.context = base.join(&self.context);
        }
    }
}

fn default_compile_time_limit() -> u64 {
    DEFAULT_COMPILE_TIME_LIMIT_SECS
}

/// How to compile the subject program inside a provisioned container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileInstructions {
    /// Shell command, run with `/bin/sh -c`.
    pub command: String,

    /// Working directory inside the container (empty = image default).
    #[serde(default)]
    pub context: String,

    #[serde(default = "default_compile_time_limit")]
    pub time_limit_secs: u64,
}

impl CompileInstructions {
    pub fn new(command: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            context: context.into(),
            time_limit_secs: DEFAULT_COMPILE_TIME_LIMIT_SECS,
        }
    }

    pub fn with_time_limit(mut self, secs: u64) -> Self {
        self.time_limit_secs = secs;
        self
    }
}

/// A registered, reproducible defect scenario.
///
/// Immutable once loaded; owned by the dataset that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bug {
    /// Unique identifier.
    pub name: String,

    /// Name of the dataset this bug belongs to (filled in on load).
    #[serde(default)]
    pub dataset: Option<String>,

    /// Name of the subject program.
    #[serde(default)]
    pub program: Option<String>,

    #[serde(rename = "build")]
    pub build_instructions: BuildInstructions,

    #[serde(rename = "compiler")]
    pub compile_instructions: CompileInstructions,

    pub harness: HarnessSpec,
}

impl Bug {
    pub fn new(
        name: impl Into<String>,
        build_instructions: BuildInstructions,
        compile_instructions: CompileInstructions,
        harness: HarnessSpec,
    ) -> Self {
        Self {
            name: name.into(),
            dataset: None,
            program: None,
            build_instructions,
            compile_instructions,
            harness,
        }
    }

    pub fn build_instructions(&self) -> &BuildInstructions {
        &self.build_instructions
    }

    pub fn compile_instructions(&self) -> &CompileInstructions {
        &self.compile_instructions
    }

    /// The expected test partition for this bug.
    pub fn harness(&self) -> &dyn TestHarness {
        &self.harness
    }
}

impl std::fmt::Display for Bug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

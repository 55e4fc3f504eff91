//! Dataset sources: collections of bugs, loaded from TOML manifests.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::{Bug, BuildInstructions};

/// Errors raised while loading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("dataset {dataset} declares bug {bug} more than once")]
    DuplicateBug { dataset: String, bug: String },

    #[error("dataset name must not be empty")]
    EmptyName,
}

/// A collection of bugs, queryable by identifier.
pub trait DatasetSource: Send + Sync {
    fn name(&self) -> &str;

    /// Every bug in this source, in declaration order.
    fn bugs(&self) -> &[Bug];

    fn get(&self, name: &str) -> Option<&Bug> {
        self.bugs().iter().find(|bug| bug.name == name)
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Auxiliary images (e.g. shared base images) bugs may depend on.
    fn images(&self) -> &[BuildInstructions] {
        &[]
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    #[serde(default)]
    images: Vec<BuildInstructions>,
    #[serde(default)]
    bugs: Vec<Bug>,
}

/// A dataset backed by an in-memory list of bugs.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    bugs: Vec<Bug>,
    images: Vec<BuildInstructions>,
    index: HashMap<String, usize>,
}

impl Dataset {
    /// Create a dataset; every bug is stamped with the dataset name.
    pub fn new(name: impl Into<String>, bugs: Vec<Bug>) -> Result<Self, DatasetError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DatasetError::EmptyName);
        }

        let mut index = HashMap::with_capacity(bugs.len());
        let mut stamped = Vec::with_capacity(bugs.len());
        for (i, mut bug) in bugs.into_iter().enumerate() {
            if index.insert(bug.name.clone(), i).is_some() {
                return Err(DatasetError::DuplicateBug {
                    dataset: name,
                    bug: bug.name,
                });
            }
            bug.dataset = Some(name.clone());
            stamped.push(bug);
        }

        Ok(Self {
            name,
            bugs: stamped,
            images: Vec::new(),
            index,
        })
    }

    pub fn with_images(mut self, images: Vec<BuildInstructions>) -> Self {
        self.images = images;
        self
    }

    /// Load a dataset from a TOML manifest file.
    ///
    /// Relative Dockerfile and context paths are resolved against the
    /// manifest's directory.
    pub fn from_manifest(path: &Path) -> Result<Self, DatasetError> {
        let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(&text, base, path)
    }

    /// Parse a manifest. `origin` is only used in error messages.
    pub fn from_toml(text: &str, base: &Path, origin: &Path) -> Result<Self, DatasetError> {
        let manifest: Manifest = toml::from_str(text).map_err(|source| DatasetError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        let mut bugs = manifest.bugs;
        for bug in &mut bugs {
            bug.build_instructions.resolve_paths(base);
        }
        let mut images = manifest.images;
        for image in &mut images {
            image.resolve_paths(base);
        }

        let dataset = Self::new(manifest.name, bugs)?.with_images(images);
        debug!(
            dataset = %dataset.name,
            bugs = dataset.bugs.len(),
            images = dataset.images.len(),
            "Loaded dataset manifest"
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.bugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bugs.is_empty()
    }
}

impl DatasetSource for Dataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn bugs(&self) -> &[Bug] {
        &self.bugs
    }

    fn get(&self, name: &str) -> Option<&Bug> {
        self.index.get(name).map(|&i| &self.bugs[i])
    }

    fn images(&self) -> &[BuildInstructions] {
        &self.images
    }
}

//! Bug registry: resolves bug identifiers across dataset sources.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::dataset::{Dataset, DatasetSource};
use crate::domain::{Bug, BuildInstructions, ReproboxError, Result};
use crate::gateway::BuildGateway;

/// Lookup path over an ordered list of dataset sources.
///
/// The registry holds no copies of bugs; each bug is owned by its source.
/// Sources are consulted in registration order and the first match wins.
#[derive(Default)]
pub struct BugRegistry {
    sources: Vec<Box<dyn DatasetSource>>,
}

impl BugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one dataset per manifest path, in the given order.
    pub fn load(manifests: &[PathBuf]) -> Result<Self> {
        let mut registry = Self::new();
        for path in manifests {
            let dataset = Dataset::from_manifest(path)?;
            info!(
                dataset = %dataset.name(),
                bugs = dataset.len(),
                path = %path.display(),
                "Registered dataset"
            );
            registry.add_source(Box::new(dataset));
        }
        Ok(registry)
    }

    pub fn with_source(mut self, source: impl DatasetSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn add_source(&mut self, source: Box<dyn DatasetSource>) {
        self.sources.push(source);
    }

    /// Resolve a bug by identifier.
    pub fn resolve(&self, name: &str) -> Result<&Bug> {
        for source in &self.sources {
            if source.contains(name) {
                if let Some(bug) = source.get(name) {
                    debug!(bug = %name, dataset = %source.name(), "Resolved bug");
                    return Ok(bug);
                }
            }
        }
        Err(ReproboxError::BugNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s.contains(name))
    }

    /// Every bug of every source, each visited exactly once.
    pub fn bugs(&self) -> impl Iterator<Item = &Bug> + '_ {
        self.sources.iter().flat_map(|s| s.bugs().iter())
    }

    /// Build instructions for every known image: auxiliary images first,
    /// then one per bug.
    pub fn build_instructions(&self) -> impl Iterator<Item = &BuildInstructions> + '_ {
        let images = self.sources.iter().flat_map(|s| s.images().iter());
        images.chain(self.bugs().map(|b| b.build_instructions()))
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn is_installed(&self, bug: &Bug, gateway: &dyn BuildGateway) -> bool {
        gateway.is_installed(bug.build_instructions())
    }

    pub fn len(&self) -> usize {
        self.sources.iter().map(|s| s.bugs().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for BugRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BugRegistry")
            .field("sources", &self.source_names())
            .finish()
    }
}

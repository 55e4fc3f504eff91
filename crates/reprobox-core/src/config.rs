//! Runtime configuration.
//!
//! Values come from the environment; the CLI overrides them with flags.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{ReproboxError, Result};

/// Path list of dataset manifests, separated like `PATH`.
pub const DATASETS_ENV: &str = "REPROBOX_DATASETS";
/// Docker client binary.
pub const DOCKER_ENV: &str = "REPROBOX_DOCKER";
/// Upper bound on captured output per container command.
pub const OUTPUT_LIMIT_ENV: &str = "REPROBOX_OUTPUT_LIMIT_BYTES";

pub const DEFAULT_DOCKER_BINARY: &str = "docker";
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReproboxConfig {
    /// Dataset manifests, searched in order.
    pub datasets: Vec<PathBuf>,
    pub docker_binary: String,
    pub output_limit_bytes: usize,
}

impl Default for ReproboxConfig {
    fn default() -> Self {
        ReproboxConfig {
            datasets: Vec::new(),
            docker_binary: DEFAULT_DOCKER_BINARY.to_string(),
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl ReproboxConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var_os(key))
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Unset or empty variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut config = Self::default();
        let present = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(paths) = present(DATASETS_ENV) {
            config.datasets = env::split_paths(&paths).collect();
        }
        if let Some(binary) = present(DOCKER_ENV) {
            config.docker_binary = binary.to_string_lossy().into_owned();
        }
        if let Some(limit) = present(OUTPUT_LIMIT_ENV) {
            let limit = limit.to_string_lossy();
            config.output_limit_bytes = limit.trim().parse().map_err(|_| {
                ReproboxError::Config(format!("{OUTPUT_LIMIT_ENV} is not a byte count: {limit}"))
            })?;
        }
        Ok(config)
    }

    /// Replace the dataset list unless `datasets` is empty.
    pub fn with_datasets(mut self, datasets: Vec<PathBuf>) -> Self {
        if !datasets.is_empty() {
            self.datasets = datasets;
        }
        self
    }

    pub fn with_docker_binary(mut self, binary: impl Into<String>) -> Self {
        self.docker_binary = binary.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ReproboxConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ReproboxConfig::default());
        assert_eq!(config.docker_binary, "docker");
        assert_eq!(config.output_limit_bytes, 1024 * 1024);
    }

    #[test]
    fn test_reads_all_variables() {
        let joined = env::join_paths(["/data/a.toml", "/data/b.toml"]).unwrap();
        let joined = joined.to_string_lossy().into_owned();
        let config = ReproboxConfig::from_lookup(lookup(&[
            (DATASETS_ENV, &joined),
            (DOCKER_ENV, "podman"),
            (OUTPUT_LIMIT_ENV, "4096"),
        ]))
        .unwrap();

        assert_eq!(
            config.datasets,
            vec![PathBuf::from("/data/a.toml"), PathBuf::from("/data/b.toml")]
        );
        assert_eq!(config.docker_binary, "podman");
        assert_eq!(config.output_limit_bytes, 4096);
    }

    #[test]
    fn test_empty_values_keep_defaults() {
        let config =
            ReproboxConfig::from_lookup(lookup(&[(DOCKER_ENV, ""), (DATASETS_ENV, "")])).unwrap();
        assert_eq!(config.docker_binary, "docker");
        assert!(config.datasets.is_empty());
    }

    #[test]
    fn test_bad_output_limit_is_config_error() {
        let err = ReproboxConfig::from_lookup(lookup(&[(OUTPUT_LIMIT_ENV, "lots")])).unwrap_err();
        assert!(matches!(err, ReproboxError::Config(_)));
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn test_flag_overrides() {
        let config = ReproboxConfig::default()
            .with_datasets(vec![PathBuf::from("bugs.toml")])
            .with_docker_binary("/usr/local/bin/docker");
        assert_eq!(config.datasets, vec![PathBuf::from("bugs.toml")]);
        assert_eq!(config.docker_binary, "/usr/local/bin/docker");

        let unchanged = config.clone().with_datasets(Vec::new());
        assert_eq!(unchanged, config);
    }
}

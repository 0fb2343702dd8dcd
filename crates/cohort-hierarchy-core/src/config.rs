//! Configuration discovery and loading
//!
//! Configuration is optional: every field has a default and a missing file
//! falls back to [`HierarchyConfig::default`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HierarchyError;
use crate::result::Result;

/// Config file names, in discovery priority order.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    ".cohortrc.json",
    ".cohortrc.toml",
    "cohort-hierarchy.json",
    "cohort-hierarchy.toml",
    "cohort-hierarchy.yaml",
];

/// Top-level configuration of the hierarchy engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HierarchyConfig {
    /// Missing-code resolution policy
    pub fetch: FetchConfig,
}

/// Limits of the missing-code fetch loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchConfig {
    /// Upper bound on fetch requests issued by a single resolution
    pub max_fetches: usize,
    /// Levels resolved below a node the user expands
    pub expand_depth: usize,
    /// Levels resolved below codes of interest by the `Init` and `Search`
    /// resolutions of [`crate::fetcher`]. `None` resolves until no new code
    /// is discovered.
    pub eager_depth: Option<usize>,
    /// Levels resolved below codes of interest when a session loads or
    /// searches. Deeper levels are fetched by expanding.
    pub load_depth: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_fetches: 10_000,
            expand_depth: 1,
            eager_depth: None,
            load_depth: 0,
        }
    }
}

impl HierarchyConfig {
    /// Parse a config file, dispatching on its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| HierarchyError::io_error(path, e))?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| HierarchyError::config_error(e.to_string()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| HierarchyError::config_error(e.to_string()))?,
            _ => serde_json::from_str(&content)
                .map_err(|e| HierarchyError::config_error(e.to_string()))?,
        };
        Ok(config)
    }

    fn validate(self) -> Result<Self> {
        if self.fetch.max_fetches == 0 {
            return Err(HierarchyError::config_error(
                "fetch.maxFetches must be at least 1",
            ));
        }
        Ok(self)
    }
}

/// Configuration loader for discovering and loading config files
pub struct ConfigLoader;

impl ConfigLoader {
    /// Auto-discover a config file by traversing upward from `start_path`
    pub fn auto_discover(start_path: &Path) -> Result<Option<PathBuf>> {
        let mut current = start_path
            .canonicalize()
            .map_err(|e| HierarchyError::config_error(format!("Invalid path: {e}")))?;

        loop {
            for filename in CONFIG_FILE_NAMES {
                let config_path = current.join(filename);
                if config_path.is_file() {
                    tracing::debug!("Found config: {}", config_path.display());
                    return Ok(Some(config_path));
                }
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<HierarchyConfig> {
        HierarchyConfig::load(path)
            .and_then(HierarchyConfig::validate)
            .map_err(|e| {
                HierarchyError::config_error(format!(
                    "Failed to load config from '{}': {}",
                    path.display(),
                    e
                ))
            })
    }

    /// Load config from path or auto-discover, defaulting when none is found
    pub fn load(custom_path: Option<&Path>, start_dir: Option<&Path>) -> Result<HierarchyConfig> {
        if let Some(path) = custom_path {
            if !path.exists() {
                return Err(HierarchyError::config_error(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::load_from_file(path);
        }

        let search_dir = start_dir.unwrap_or_else(|| Path::new("."));
        match Self::auto_discover(search_dir)? {
            Some(path) => Self::load_from_file(&path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(HierarchyConfig::default())
            }
        }
    }
}

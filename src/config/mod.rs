//! Configuration loading.
//!
//! Sources, lowest priority first: built-in defaults, the YAML file, the
//! `EDGEGRAPH_DB` / `EDGEGRAPH_PAGE_SIZE` environment variables, then
//! whatever the CLI applies on top.

pub mod schema;

pub use schema::{DatabaseConfig, EdgeGraphConfig, TraversalConfig};

use std::path::{Path, PathBuf};

use crate::error::{EdgeGraphError, Result};
use crate::types::PageSize;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "edgegraph.yaml";

pub const ENV_DB: &str = "EDGEGRAPH_DB";
pub const ENV_PAGE_SIZE: &str = "EDGEGRAPH_PAGE_SIZE";

impl EdgeGraphConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if it exists, then
    /// apply environment overrides.
    ///
    /// An explicitly given file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse one YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&contents)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DB).filter(|v| !v.is_empty()) {
            self.database.path = PathBuf::from(db);
        }
        if let Some(raw) = lookup(ENV_PAGE_SIZE) {
            let size: usize = raw.trim().parse().map_err(|_| {
                EdgeGraphError::Configuration(format!("{ENV_PAGE_SIZE} is not a number: {raw:?}"))
            })?;
            self.traversal.page_size = PageSize::new(size)?;
        }
        Ok(())
    }
}

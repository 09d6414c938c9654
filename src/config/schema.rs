//! Configuration data structures for EdgeGraph.
//!
//! Defines the YAML config format: database location, traversal tuning and
//! sample-data sizes. Every field has a default so a partial file is valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::seed::SeedConfig;
use crate::types::PageSize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for EdgeGraph.
///
/// Loaded from a YAML file, then environment variables, then CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeGraphConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub traversal: TraversalConfig,

    #[serde(default)]
    pub seed: SeedConfig,
}

// ---------------------------------------------------------------------------
// DatabaseConfig
// ---------------------------------------------------------------------------

/// Where the SQLite document store lives and how long to wait on locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Lock wait before a query fails with a timeout.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// TraversalConfig
// ---------------------------------------------------------------------------

/// Traversal tuning. A zero page size fails deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalConfig {
    #[serde(default)]
    pub page_size: PageSize,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_db_path() -> PathBuf {
    PathBuf::from("edgegraph.db")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = EdgeGraphConfig::default();
        assert_eq!(config.database.path, PathBuf::from("edgegraph.db"));
        assert_eq!(config.database.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.traversal.page_size.get(), 16);
        assert_eq!(config.seed.users, 100);
        assert_eq!(config.seed.groups, 10);
        assert_eq!(config.seed.edges, 100);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config: EdgeGraphConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, EdgeGraphConfig::default());
    }

    #[test]
    fn test_full_yaml_config() {
        let yaml = r#"
database:
  path: /var/lib/edgegraph/members.db
  busy_timeout_ms: 250
traversal:
  page_size: 7
seed:
  users: 20
  groups: 4
  edges: 50
  rng_seed: 99
"#;
        let config: EdgeGraphConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.database.path,
            PathBuf::from("/var/lib/edgegraph/members.db")
        );
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.traversal.page_size.get(), 7);
        assert_eq!(config.seed.rng_seed, Some(99));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let result: Result<EdgeGraphConfig, _> =
            serde_yaml::from_str("traversal:\n  page_size: 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_yaml_roundtrip() {
        let mut config = EdgeGraphConfig::default();
        config.seed.rng_seed = Some(3);
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: EdgeGraphConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let result: Result<EdgeGraphConfig, _> = serde_yaml::from_str("database: [oops");
        assert!(result.is_err());
    }
}

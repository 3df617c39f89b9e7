//! Configuration for the store module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the filesystem artifact store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory holding `logs/<job>/<run>/` trees.
    pub root: PathBuf,

    /// Runs modified more recently than this are not listed yet.
    #[serde(default = "default_min_run_age")]
    pub min_run_age_secs: u64,
}

fn default_min_run_age() -> u64 {
    4 * 3600 // 4 hours
}

impl StoreConfig {
    /// Creates a config for the given root with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            min_run_age_secs: default_min_run_age(),
        }
    }

    /// Sets the minimum run age.
    pub fn with_min_run_age(mut self, age: Duration) -> Self {
        self.min_run_age_secs = age.as_secs();
        self
    }

    pub fn min_run_age(&self) -> Duration {
        Duration::from_secs(self.min_run_age_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_min_age() {
        let config = StoreConfig::new("/data/ci");
        assert_eq!(config.min_run_age(), Duration::from_secs(14400));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: StoreConfig = toml::from_str(r#"root = "/data/ci""#).unwrap();
        assert_eq!(config.root, PathBuf::from("/data/ci"));
        assert_eq!(config.min_run_age_secs, 14400);
    }
}

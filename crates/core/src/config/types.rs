use serde::{Deserialize, Serialize};

use crate::ingest::{Job, LoaderConfig};
use crate::sink::SinkConfig;
use crate::store::StoreConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub loader: LoaderConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Tracked jobs
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Default filter directive, used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::LoadCategory;
    use std::path::PathBuf;

    #[test]
    fn test_minimal_config() {
        let config: Config = toml::from_str(
            r#"
[store]
root = "/data/ci"
"#,
        )
        .unwrap();

        assert_eq!(config.store.root, PathBuf::from("/data/ci"));
        assert_eq!(config.loader.category, LoadCategory::TestRuns);
        assert_eq!(config.sink.path, PathBuf::from("runloader.db"));
        assert_eq!(config.log.level, "info");
        assert!(!config.log.json);
        assert!(config.jobs.is_empty());
    }

    #[test]
    fn test_jobs_tables() {
        let config: Config = toml::from_str(
            r#"
[store]
root = "/data/ci"

[[jobs]]
name = "periodic-ci-release-amd64"
collect_test_runs = true

[[jobs]]
name = "periodic-ci-upgrade-aws"
collect_disruption = true
"#,
        )
        .unwrap();

        assert_eq!(config.jobs.len(), 2);
        assert!(config.jobs[0].collect_test_runs);
        assert!(config.jobs[1].collect_disruption);
        assert!(!config.jobs[1].collect_test_runs);
    }
}

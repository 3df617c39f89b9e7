use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SQLite sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_sink_path")]
    pub path: PathBuf,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: default_sink_path(),
        }
    }
}

fn default_sink_path() -> PathBuf {
    PathBuf::from("runloader.db")
}

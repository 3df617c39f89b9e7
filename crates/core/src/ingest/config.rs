//! Loader configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::types::LoadCategory;

/// Configuration for a load pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Data family collected by this pass.
    #[serde(default)]
    pub category: LoadCategory,

    /// Jobs processed at the same time (M).
    #[serde(default = "default_concurrency")]
    pub max_concurrent_jobs: usize,

    /// Artifact reads in flight per job (N).
    /// Only bounds fetching; runs waiting to commit hold no token.
    #[serde(default = "default_concurrency")]
    pub max_concurrent_fetches: usize,

    /// Where to write Prometheus metrics after the pass, if anywhere.
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,
}

fn default_concurrency() -> usize {
    20
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            category: LoadCategory::default(),
            max_concurrent_jobs: default_concurrency(),
            max_concurrent_fetches: default_concurrency(),
            metrics_path: None,
        }
    }
}

impl LoaderConfig {
    pub fn with_category(mut self, category: LoadCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_concurrency(mut self, jobs: usize, fetches: usize) -> Self {
        self.max_concurrent_jobs = jobs;
        self.max_concurrent_fetches = fetches;
        self
    }
}

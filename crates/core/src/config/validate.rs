use std::collections::HashSet;

use tracing_subscriber::EnvFilter;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Concurrency bounds are not 0
/// - Job names are non-empty and unique
/// - Log level is a valid filter directive
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Loader validation
    if config.loader.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "loader.max_concurrent_jobs cannot be 0".to_string(),
        ));
    }
    if config.loader.max_concurrent_fetches == 0 {
        return Err(ConfigError::ValidationError(
            "loader.max_concurrent_fetches cannot be 0".to_string(),
        ));
    }

    // Job validation
    let mut seen = HashSet::new();
    for job in &config.jobs {
        if job.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "jobs.name cannot be empty".to_string(),
            ));
        }
        if !seen.insert(job.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "job {} is listed more than once",
                job.name
            )));
        }
    }

    // Log validation
    if let Err(e) = EnvFilter::try_new(&config.log.level) {
        return Err(ConfigError::ValidationError(format!(
            "log.level {:?} is invalid: {}",
            config.log.level, e
        )));
    }

    Ok(())
}

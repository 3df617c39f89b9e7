use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use runloader_core::{
    create_uploader, load_config, metrics, validate_config, Config, ConfigJobSource,
    FsArtifactStore, Loader, LogConfig, SqliteSink,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    // Determine config path
    let config_path = std::env::var("RUNLOADER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("runloader.toml"));

    let config = match read_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LogConfig::default());
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.log);

    if let Err(e) = run(config, &config_path).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let config =
        load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(config: Config, config_path: &Path) -> Result<()> {
    info!("runloader {} using {:?}", VERSION, config_path);
    info!("Artifact root: {:?}", config.store.root);
    info!("Sink database: {:?}", config.sink.path);

    // Create SQLite sink
    let sink = Arc::new(SqliteSink::new(&config.sink.path).context("Failed to open sink")?);
    let uploader = create_uploader(config.loader.category, Arc::clone(&sink));

    let store = Arc::new(FsArtifactStore::new(config.store.clone()));
    let jobs = Arc::new(ConfigJobSource::new(config.jobs.clone()));
    let loader = Loader::new(config.loader.clone(), jobs, store, sink, uploader);

    // Cancel the pass on Ctrl+C / SIGTERM
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown signal received, cancelling load");
        trigger.cancel();
    });

    let report = loader.run(&cancel).await;

    if let Some(path) = &loader.config().metrics_path {
        match write_metrics(path).await {
            Ok(()) => info!("Metrics written to {:?}", path),
            Err(e) => warn!("Failed to write metrics: {:#}", e),
        }
    }

    report.into_result()?;
    Ok(())
}

/// Write the Prometheus text exposition of the loader metrics.
async fn write_metrics(path: &Path) -> Result<()> {
    let registry = Registry::new();
    for metric in metrics::all_metrics() {
        registry
            .register(metric)
            .context("Failed to register metric")?;
    }

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    tokio::fs::write(path, buffer)
        .await
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

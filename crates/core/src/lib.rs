pub mod config;
pub mod ingest;
pub mod metrics;
pub mod sink;
pub mod store;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LogConfig,
};
pub use ingest::{
    AggregateError, Checkpoint, IngestError, Job, JobPipeline, JobReport, LoadCategory,
    LoadReport, Loader, LoaderConfig, RunId, WorkerPool,
};
pub use sink::{
    create_uploader, CommitRecord, Sink, SinkConfig, SinkError, SqliteSink, Uploader,
};
pub use store::{
    ArtifactStore, ConfigJobSource, FsArtifactStore, JobSource, RawArtifact, StoreConfig,
    StoreError,
};

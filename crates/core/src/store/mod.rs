//! Store module: read-only access to CI job runs.
//!
//! Provides the collaborator traits consumed by the ingest pipeline:
//! - [`JobSource`]: lists the tracked jobs
//! - [`ArtifactStore`]: lists run identifiers and reads run artifacts
//!
//! [`FsArtifactStore`] reads a bucket-shaped directory tree from local disk.

mod config;
mod error;
mod fs_store;
mod job_source;
mod traits;
mod types;

pub use config::StoreConfig;
pub use error::StoreError;
pub use fs_store::FsArtifactStore;
pub use job_source::ConfigJobSource;
pub use traits::{ArtifactStore, JobSource, RunIdStream};
pub use types::{
    DisruptionSample, ProwJob, ProwJobSpec, ProwJobState, ProwJobStatus, RawArtifact, TestCase,
    TestStatus,
};

//! Sink module: the system of record receiving committed runs.
//!
//! - [`Sink`]: append-only run records plus the latest-run lookup used for checkpoints
//! - [`Uploader`]: category content written after a run's record
//!
//! [`SqliteSink`] implements both tables locally; [`create_uploader`] picks
//! the uploader for a [`LoadCategory`](crate::ingest::LoadCategory).

mod config;
mod error;
mod sqlite;
mod traits;
mod types;
mod uploaders;

pub use config::SinkConfig;
pub use error::SinkError;
pub use sqlite::SqliteSink;
pub use traits::{Sink, Uploader};
pub use types::CommitRecord;
pub use uploaders::{create_uploader, DisruptionUploader, TestRunUploader};

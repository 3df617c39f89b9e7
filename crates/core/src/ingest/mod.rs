//! Ordered, concurrency-bounded ingestion of job runs.
//!
//! A load pass works like this:
//! - **Jobs**: a [`WorkerPool`] of M workers drains the list of tracked jobs
//! - **Runs**: per job, a [`RunEnumerator`] lists runs after the job's [`Checkpoint`]
//! - **Fetch**: a [`FetchStage`] reads runs with at most N reads in flight
//! - **Commit**: [`Slot`]s chained by [`Gate`]s write to the sink in run order
//!
//! Failures never stop sibling runs or jobs; they are gathered in the
//! [`LoadReport`] and surface together as an [`AggregateError`].

mod commit;
mod config;
mod enumerate;
mod error;
mod fetch;
mod gate;
mod job;
mod loader;
mod pool;
mod report;
mod types;

pub use commit::{CommitStage, Slot, SlotOutcome, SlotStatus, Watermark};
pub use config::LoaderConfig;
pub use enumerate::{load_checkpoint, RunEnumerator};
pub use error::{AggregateError, IngestError};
pub use fetch::{normalize, FetchOutcome, FetchStage};
pub use gate::{Gate, GateCloser};
pub use job::JobPipeline;
pub use loader::Loader;
pub use pool::{PoolOutcome, WorkerPool};
pub use report::{JobReport, LoadReport};
pub use types::{Checkpoint, Job, LoadCategory, RunId};

//! Checkpoint lookup and run enumeration.

use futures::StreamExt;
use tracing::debug;

use crate::sink::Sink;
use crate::store::{ArtifactStore, RunIdStream, StoreError};

use super::error::IngestError;
use super::types::{Checkpoint, RunId};

/// Reads the checkpoint of a job from the latest run recorded in the sink.
pub async fn load_checkpoint(sink: &dyn Sink, job: &str) -> Result<Checkpoint, IngestError> {
    let latest = sink
        .latest_run_for(job)
        .await
        .map_err(|source| IngestError::Checkpoint {
            job: job.to_string(),
            source,
        })?;
    let checkpoint = Checkpoint::from_latest(latest);
    debug!(job, %checkpoint, "loaded checkpoint");
    Ok(checkpoint)
}

/// Ascending sequence of the runs of one job that lie after its checkpoint.
///
/// The order produced here is the order runs are committed in. Identifiers
/// from the store that are not strictly increasing end the enumeration with
/// an error, as does any listing failure. After an error the enumerator is
/// exhausted.
pub struct RunEnumerator {
    job: String,
    runs: RunIdStream,
    last: Checkpoint,
    done: bool,
}

impl RunEnumerator {
    /// Starts listing the runs of `job` after `checkpoint`.
    pub async fn open(
        store: &dyn ArtifactStore,
        job: &str,
        checkpoint: &Checkpoint,
    ) -> Result<Self, IngestError> {
        let from = checkpoint.resume_point();
        let runs = store
            .list_run_ids(job, from.as_ref())
            .await
            .map_err(|source| IngestError::Enumerate {
                job: job.to_string(),
                source,
            })?;

        Ok(Self {
            job: job.to_string(),
            runs,
            last: checkpoint.clone(),
            done: false,
        })
    }

    /// Next run to process, `None` once the listing is exhausted.
    ///
    /// Cancel safe: dropping the returned future loses no identifier.
    pub async fn next(&mut self) -> Option<Result<RunId, IngestError>> {
        if self.done {
            return None;
        }

        let item = self.runs.next().await;
        match item {
            None => {
                self.done = true;
                None
            }
            Some(Err(source)) => {
                self.done = true;
                Some(Err(self.error(source)))
            }
            Some(Ok(run)) => {
                if !self.last.admits(&run) {
                    self.done = true;
                    let source = StoreError::OutOfOrder {
                        previous: self.last.to_string(),
                        next: run.to_string(),
                    };
                    return Some(Err(self.error(source)));
                }
                self.last.advance(&run);
                Some(Ok(run))
            }
        }
    }

    fn error(&self, source: StoreError) -> IngestError {
        IngestError::Enumerate {
            job: self.job.clone(),
            source,
        }
    }
}

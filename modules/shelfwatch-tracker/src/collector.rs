use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use brightdata_client::{partition_items, BrightDataError, SnapshotBody};
use shelfwatch_common::ShelfwatchError;

use crate::clock::Clock;
use crate::traits::SnapshotApi;

/// Lifecycle of one submitted collection. Only the poll loop mutates this;
/// the three right-hand states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Polling,
    Completed,
    Failed,
    TimedOut,
}

/// A submitted collection job tracked against its server-side snapshot.
#[derive(Debug, Clone)]
pub struct CollectionJob {
    pub id: Uuid,
    pub snapshot_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

/// Terminal result of a poll loop.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The snapshot returned its item list. Partial success is success:
    /// errored inputs ride along in `errors`.
    Completed {
        successes: Vec<Value>,
        errors: Vec<Value>,
        polls: u32,
    },
    /// The snapshot itself is gone or rejected; no amount of waiting helps.
    Failed { error: String, polls: u32 },
    /// No terminal response within the deadline.
    TimedOut { waited: Duration, polls: u32 },
}

/// Drives Bright Data collections from submission to a terminal outcome.
pub struct Collector<'a> {
    api: &'a dyn SnapshotApi,
    clock: &'a dyn Clock,
}

impl<'a> Collector<'a> {
    pub fn new(api: &'a dyn SnapshotApi, clock: &'a dyn Clock) -> Self {
        Self { api, clock }
    }

    /// Submit a keyword-discovery collection.
    pub async fn submit_discovery(
        &self,
        dataset_id: &str,
        keywords: &[String],
        limit_per_input: u32,
    ) -> Result<CollectionJob, ShelfwatchError> {
        let snapshot_id = self
            .api
            .trigger_discovery(dataset_id, keywords, limit_per_input)
            .await
            .map_err(submission_error)?;
        Ok(self.job(snapshot_id))
    }

    /// Submit a collection over explicit input parameter maps.
    pub async fn submit(
        &self,
        dataset_id: &str,
        inputs: &[Value],
    ) -> Result<CollectionJob, ShelfwatchError> {
        let snapshot_id = self
            .api
            .trigger_collection(dataset_id, inputs)
            .await
            .map_err(submission_error)?;
        Ok(self.job(snapshot_id))
    }

    fn job(&self, snapshot_id: String) -> CollectionJob {
        let job = CollectionJob {
            id: Uuid::new_v4(),
            snapshot_id,
            status: JobStatus::Submitted,
            created_at: self.clock.now(),
        };
        info!(job_id = %job.id, snapshot_id = %job.snapshot_id, "Collection submitted");
        job
    }

    /// Poll until the snapshot turns terminal or `max_wait` elapses.
    ///
    /// Each cycle sleeps `poll_interval`, then fetches the snapshot. An
    /// in-progress or unrecognized body keeps the loop alive; transport
    /// errors are retried on the next cycle. Only a 4xx from the snapshot
    /// endpoint is terminal on its own.
    pub async fn await_completion(
        &self,
        job: &mut CollectionJob,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> JobOutcome {
        job.status = JobStatus::Polling;
        let started = self.clock.now();
        let mut polls: u32 = 0;

        loop {
            let waited = elapsed(started, self.clock.now());
            if waited >= max_wait {
                job.status = JobStatus::TimedOut;
                warn!(
                    job_id = %job.id,
                    snapshot_id = %job.snapshot_id,
                    waited_secs = waited.as_secs(),
                    polls,
                    "Timed out waiting for snapshot"
                );
                return JobOutcome::TimedOut { waited, polls };
            }

            self.clock.sleep(poll_interval).await;
            polls += 1;

            match self.api.snapshot(&job.snapshot_id).await {
                Ok(SnapshotBody::Items(items)) => {
                    let (successes, errors) = partition_items(items);
                    job.status = JobStatus::Completed;
                    info!(
                        job_id = %job.id,
                        successes = successes.len(),
                        errors = errors.len(),
                        polls,
                        "Snapshot ready"
                    );
                    return JobOutcome::Completed {
                        successes,
                        errors,
                        polls,
                    };
                }
                Ok(SnapshotBody::InProgress(status)) => {
                    debug!(job_id = %job.id, status = %status, "Snapshot still in progress");
                }
                Ok(SnapshotBody::Unknown(body)) => {
                    warn!(job_id = %job.id, body = %body, "Unexpected snapshot response, still waiting");
                }
                Err(BrightDataError::Api { status, message }) if (400..500).contains(&status) => {
                    job.status = JobStatus::Failed;
                    warn!(job_id = %job.id, status, message = %message, "Snapshot rejected");
                    return JobOutcome::Failed {
                        error: format!("API error (status {status}): {message}"),
                        polls,
                    };
                }
                Err(err) => {
                    warn!(job_id = %job.id, %err, "Snapshot poll failed, retrying");
                }
            }
        }
    }
}

fn submission_error(err: BrightDataError) -> ShelfwatchError {
    ShelfwatchError::Submission(err.to_string())
}

fn elapsed(started: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - started).to_std().unwrap_or_default()
}

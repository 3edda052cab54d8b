//! Bounded worker pool for per-entity batch jobs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::EngineError;
use super::repository::CheckpointStore;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("job {0} is already running")]
    AlreadyRunning(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: String,
    pub error: String,
}

/// Summary of one run. `completed` is false when the wall-clock budget ran out; the
/// checkpoint then tells the next run where to resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub job: String,
    pub processed: usize,
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
    pub checkpoint: Option<String>,
    pub completed: bool,
}

impl BatchReport {
    fn new(job: &str) -> Self {
        Self {
            job: job.to_string(),
            processed: 0,
            succeeded: 0,
            failures: Vec::new(),
            checkpoint: None,
            completed: false,
        }
    }
}

/// Runs units of work with fixed concurrency, a wall-clock budget and per-job
/// checkpoints. A job name can only run once at a time.
pub struct BatchRunner<C> {
    checkpoints: Arc<C>,
    concurrency: usize,
    budget: Duration,
    running: Mutex<HashSet<String>>,
}

/// Held while a job runs; dropping it frees the job name.
pub(crate) struct RunGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    job: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job);
    }
}

impl<C> BatchRunner<C>
where
    C: CheckpointStore + 'static,
{
    pub fn new(checkpoints: Arc<C>, concurrency: usize, budget: Duration) -> Self {
        Self {
            checkpoints,
            concurrency: concurrency.max(1),
            budget,
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Processes `ids` in ascending order, skipping those at or before the stored
    /// checkpoint. A failing unit is recorded and the run continues.
    pub async fn run<F>(
        &self,
        job: &str,
        mut ids: Vec<String>,
        unit: F,
    ) -> Result<BatchReport, BatchError>
    where
        F: Fn(String) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        let _guard = self.exclusive(job)?;
        let started = Instant::now();
        let unit = Arc::new(unit);

        ids.sort();
        ids.dedup();
        let resume_after = self.checkpoints.checkpoint(job).map_err(EngineError::from)?;
        if let Some(last) = &resume_after {
            ids.retain(|id| id > last);
            info!(job, resume_after = %last, remaining = ids.len(), "resuming batch");
        }

        let mut report = BatchReport::new(job);
        report.checkpoint = resume_after;

        for chunk in ids.chunks(self.concurrency) {
            if started.elapsed() >= self.budget {
                warn!(
                    job,
                    processed = report.processed,
                    checkpoint = ?report.checkpoint,
                    "batch budget exhausted"
                );
                return Ok(report);
            }

            let outcomes: Vec<(String, Result<(), String>)> =
                stream::iter(chunk.iter().cloned().map(|id| {
                    let unit = Arc::clone(&unit);
                    async move {
                        let key = id.clone();
                        let outcome = match tokio::task::spawn_blocking(move || unit(id)).await {
                            Ok(result) => result.map_err(|err| err.to_string()),
                            Err(join) => Err(format!("worker aborted: {join}")),
                        };
                        (key, outcome)
                    }
                }))
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            for (id, outcome) in outcomes {
                report.processed += 1;
                match outcome {
                    Ok(()) => report.succeeded += 1,
                    Err(error) => {
                        warn!(job, id = %id, error = %error, "batch item failed, continuing");
                        report.failures.push(ItemFailure { id, error });
                    }
                }
            }

            if let Some(last) = chunk.last() {
                self.checkpoints
                    .save_checkpoint(job, last)
                    .map_err(EngineError::from)?;
                report.checkpoint = Some(last.clone());
            }
        }

        self.checkpoints
            .clear_checkpoint(job)
            .map_err(EngineError::from)?;
        report.checkpoint = None;
        report.completed = true;
        info!(
            job,
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch completed"
        );
        Ok(report)
    }

    /// Marks `job` as running, or fails if it already is.
    pub(crate) fn exclusive(&self, job: &str) -> Result<RunGuard<'_>, BatchError> {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !running.insert(job.to_string()) {
            return Err(BatchError::AlreadyRunning(job.to_string()));
        }
        Ok(RunGuard {
            running: &self.running,
            job: job.to_string(),
        })
    }
}

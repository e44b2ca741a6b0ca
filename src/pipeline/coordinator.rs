//! Store/retry coordinator
//!
//! For every final result: persist it (successful tasks only), remove the
//! working directory, then either resubmit the task to the crawl pool or
//! settle it as stored or abandoned. Every pass ends with exactly one
//! in-flight `done`.

use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{Mutex, mpsc};

use super::PipelineContext;
use crate::crawl_engine::cleanup::remove_working_dir;
use crate::error::PipelineError;
use crate::result::FinalResult;
use crate::task::SanitizedTask;

pub(crate) async fn run_coordinator(
    ctx: Arc<PipelineContext>,
    finals: Arc<Mutex<mpsc::Receiver<FinalResult>>>,
    retry: mpsc::Sender<SanitizedTask>,
) -> Result<(), PipelineError> {
    loop {
        let next = finals.lock().await.recv().await;
        let Some(result) = next else {
            return Ok(());
        };
        handle(&ctx, result, &retry).await;
    }
}

/// How persisting one result ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreOutcome {
    /// Written to at least one destination
    Stored,
    /// No registered backend accepts any of the task's destinations
    Unstorable,
    /// The pipeline was cancelled mid-way
    Cancelled,
}

/// Write the result to every destination in order, retrying each with
/// capped exponential backoff.
async fn store_all(ctx: &PipelineContext, result: &mut FinalResult) -> StoreOutcome {
    let destinations = result.task.destinations.clone();
    let mut written = 0usize;

    for destination in &destinations {
        let Some(backend) = ctx.storage.iter().find(|b| b.accepts(destination)) else {
            error!(
                target: "mida::storage",
                "No storage backend accepts destination {destination}; skipping it for {}",
                result.task.url
            );
            continue;
        };

        let mut attempt = 0u32;
        loop {
            match backend.store(result, destination).await {
                Ok(path) => {
                    result.summary.output_path.get_or_insert(path);
                    written += 1;
                    break;
                }
                Err(e) => {
                    let delay = ctx.config.storage_backoff(attempt);
                    attempt = attempt.saturating_add(1);
                    warn!(
                        target: "mida::storage",
                        "Storing {} to {destination} via {} failed (attempt {attempt}): {e}; retrying in {delay:?}",
                        result.task.url,
                        backend.name()
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = ctx.cancel.cancelled() => {
                            error!(
                                target: "mida::storage",
                                "Pipeline cancelled while storing {}; result not stored at {destination}",
                                result.task.url
                            );
                            return StoreOutcome::Cancelled;
                        }
                    }
                }
            }
        }
    }

    if written == 0 {
        StoreOutcome::Unstorable
    } else {
        StoreOutcome::Stored
    }
}

async fn handle(ctx: &PipelineContext, mut result: FinalResult, retry: &mpsc::Sender<SanitizedTask>) {
    let mut outcome = None;
    if !result.task.task_failed {
        result.summary.timing.begin_storage = Some(Utc::now());
        outcome = Some(store_all(ctx, &mut result).await);
        result.summary.timing.end_storage = Some(Utc::now());
    }

    // Cleanup runs whatever happened above.
    if let Err(e) =
        remove_working_dir(&result.task.working_dir, ctx.config.cleanup_retry_delay()).await
    {
        error!(target: "mida::cleanup", "{e}");
    }
    for backend in &ctx.storage {
        if let Err(e) = backend.cleanup(&result.task).await {
            warn!(
                target: "mida::cleanup",
                "{} cleanup failed for {}: {e}",
                backend.name(),
                result.task.url
            );
        }
    }

    let FinalResult {
        mut task, summary, ..
    } = result;

    if task.can_retry() && !ctx.cancel.is_cancelled() {
        task.prepare_retry();
        info!(
            "Retrying {} (attempt {} of {}) after failure: {}",
            task.url,
            task.current_attempt,
            task.max_attempts,
            task.past_failure_codes.last().map_or("", String::as_str)
        );
        ctx.in_flight.add(1);
        if retry.send(task).await.is_err() {
            // The crawl pool is gone; the retry pass can never complete.
            ctx.in_flight.done();
            error!("Crawl pool closed; dropping retry for {}", summary.url);
        } else {
            ctx.stats.retried.fetch_add(1, Ordering::Relaxed);
        }
    } else if task.task_failed {
        let mut history = task.past_failure_codes.clone();
        history.push(task.failure_code.clone());
        error!(
            "Abandoning {} after {} attempt(s); failures: {:?}",
            task.url, task.current_attempt, history
        );
        ctx.stats.abandoned.fetch_add(1, Ordering::Relaxed);
    } else {
        match outcome {
            Some(StoreOutcome::Stored) => {
                ctx.stats.stored.fetch_add(1, Ordering::Relaxed);
            }
            Some(StoreOutcome::Unstorable) => {
                error!(
                    "Abandoning {}: none of its destinations ({}) has a storage backend",
                    task.url,
                    task.destinations
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                ctx.stats.abandoned.fetch_add(1, Ordering::Relaxed);
            }
            Some(StoreOutcome::Cancelled) | None => {}
        }
    }

    ctx.monitor.record(&summary);
    ctx.in_flight.done();
}

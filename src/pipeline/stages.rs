//! Intake and postprocess stages

use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};

use super::PipelineContext;
use crate::dispatch::Dispatcher;
use crate::error::PipelineError;
use crate::postprocess::postprocess;
use crate::result::{FinalResult, RawResult};
use crate::task::{SanitizedTask, Sanitizer};

/// Pull raw tasks from the dispatcher, sanitize them and admit them to the
/// crawl pool. Once the source is exhausted, closes the fresh edge as soon
/// as nothing is in flight any more.
pub(crate) async fn run_intake<D, S>(
    ctx: Arc<PipelineContext>,
    mut dispatcher: D,
    sanitizer: S,
    fresh: mpsc::Sender<SanitizedTask>,
) -> Result<(), PipelineError>
where
    D: Dispatcher,
    S: Sanitizer,
{
    let interval = ctx.config.intake_interval();
    let mut next_admit = Instant::now();

    loop {
        let raw = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return Ok(()),
            raw = dispatcher.next() => raw,
        };
        let Some(raw) = raw else {
            break;
        };

        let task = match sanitizer.sanitize(raw) {
            Ok(task) => task,
            Err(e) => {
                warn!("Dropping invalid task: {e}");
                ctx.stats.invalid.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        if !interval.is_zero() {
            tokio::select! {
                () = sleep_until(next_admit) => {}
                () = ctx.cancel.cancelled() => return Ok(()),
            }
            next_admit = Instant::now() + interval;
        }

        let url = task.url.clone();
        ctx.in_flight.add(1);
        tokio::select! {
            sent = fresh.send(task) => {
                if sent.is_err() {
                    ctx.in_flight.done();
                    warn!("Crawl pool closed; stopping intake");
                    return Ok(());
                }
            }
            () = ctx.cancel.cancelled() => return Ok(()),
        }
        ctx.stats.admitted.fetch_add(1, Ordering::Relaxed);
        debug!("Admitted task for {url}");
    }

    info!(
        "Task source exhausted; waiting on {} task(s) in flight",
        ctx.in_flight.get()
    );
    tokio::select! {
        () = ctx.in_flight.wait_idle() => info!("No tasks in flight; closing crawl pool input"),
        () = ctx.cancel.cancelled() => {}
    }
    drop(fresh);
    Ok(())
}

/// Project every raw result and hand it to the coordinators
pub(crate) async fn run_postprocessor(
    mut raws: mpsc::Receiver<RawResult>,
    finals: mpsc::Sender<FinalResult>,
) -> Result<(), PipelineError> {
    while let Some(raw) = raws.recv().await {
        if finals.send(postprocess(raw)).await.is_err() {
            return Err(PipelineError::Stage {
                stage: "postprocess",
                reason: "every coordinator stopped".into(),
            });
        }
    }
    debug!("Postprocessor finished");
    Ok(())
}

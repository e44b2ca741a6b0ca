//! Crawl pool: a fixed set of workers, each running one site visit at a time

use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use super::session;
use crate::error::PipelineError;
use crate::pipeline::{PipelineContext, TaskInputs};
use crate::result::RawResult;

async fn crawl_worker(
    id: usize,
    inputs: Arc<Mutex<TaskInputs>>,
    ctx: Arc<PipelineContext>,
    raws: mpsc::Sender<RawResult>,
) -> Result<(), PipelineError> {
    debug!(target: "mida::crawl", "Crawler {id} started");
    loop {
        let next = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => None,
            task = async { inputs.lock().await.next().await } => task,
        };
        let Some(task) = next else {
            break;
        };

        let raw = session::visit(task, ctx.transport.as_ref(), &ctx.config, &ctx.cancel).await?;
        ctx.stats.crawl_passes.fetch_add(1, Ordering::Relaxed);

        if raws.send(raw).await.is_err() {
            warn!(target: "mida::crawl", "Crawler {id}: postprocessor gone, stopping");
            break;
        }
    }
    debug!(target: "mida::crawl", "Crawler {id} exited");
    Ok(())
}

/// Spawn `ctx.config.crawlers()` workers sharing `inputs` into `stages`
pub(crate) fn spawn_crawl_pool(
    stages: &mut JoinSet<Result<(), PipelineError>>,
    ctx: &Arc<PipelineContext>,
    inputs: TaskInputs,
    raws: &mpsc::Sender<RawResult>,
) {
    let inputs = Arc::new(Mutex::new(inputs));
    for id in 0..ctx.config.crawlers() {
        stages.spawn(crawl_worker(
            id,
            Arc::clone(&inputs),
            Arc::clone(ctx),
            raws.clone(),
        ));
    }
}

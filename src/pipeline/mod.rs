//! The task-processing pipeline.
//!
//! ```text
//! Dispatcher → Sanitizer → Crawl Pool → Postprocessor → Store/Retry Coordinator
//!                              ↑                                 │
//!                              └──────────── retry edge ─────────┘
//! ```
//!
//! Every stage runs as a long-lived task. Handoffs between stages hold at
//! most one item, so a slow stage pushes back on the ones before it. The
//! in-flight counter decides when intake may close the crawl pool's input;
//! closing then cascades downstream as each stage's input channel empties.

use log::{error, info};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

mod coordinator;
mod in_flight;
mod inputs;
mod stages;

pub use in_flight::InFlight;
pub use inputs::TaskInputs;

use crate::browser::BrowserTransport;
use crate::config::PipelineConfig;
use crate::crawl_engine::pool::spawn_crawl_pool;
use crate::dispatch::Dispatcher;
use crate::error::PipelineError;
use crate::monitor::{LogMonitor, Monitor};
use crate::storage::{LocalStorage, StorageBackend};
use crate::task::Sanitizer;

/// Counters behind `PipelineReport`
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub(crate) admitted: AtomicUsize,
    pub(crate) invalid: AtomicUsize,
    pub(crate) crawl_passes: AtomicUsize,
    pub(crate) stored: AtomicUsize,
    pub(crate) retried: AtomicUsize,
    pub(crate) abandoned: AtomicUsize,
}

impl PipelineStats {
    #[must_use]
    pub fn snapshot(&self) -> PipelineReport {
        PipelineReport {
            admitted: self.admitted.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            crawl_passes: self.crawl_passes.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of a pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Tasks that passed sanitization and entered the crawl pool
    pub admitted: usize,
    /// Raw tasks rejected by the sanitizer
    pub invalid: usize,
    /// Site visits performed, retries included
    pub crawl_passes: usize,
    /// Successful tasks written to all of their destinations
    pub stored: usize,
    pub retried: usize,
    /// Failed tasks that ran out of attempts, and results no backend could store
    pub abandoned: usize,
}

/// Per-run context shared by every stage
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub transport: Arc<dyn BrowserTransport>,
    /// Consulted in order; the first backend accepting a destination stores to it
    pub storage: Vec<Arc<dyn StorageBackend>>,
    pub monitor: Arc<dyn Monitor>,
    pub in_flight: InFlight,
    pub cancel: CancellationToken,
    pub stats: PipelineStats,
}

pub struct Pipeline {
    config: PipelineConfig,
    transport: Arc<dyn BrowserTransport>,
    storage: Vec<Arc<dyn StorageBackend>>,
    monitor: Arc<dyn Monitor>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// A pipeline storing to the local filesystem and logging summaries
    #[must_use]
    pub fn new(config: PipelineConfig, transport: Arc<dyn BrowserTransport>) -> Self {
        Self {
            config,
            transport,
            storage: vec![Arc::new(LocalStorage::new())],
            monitor: Arc::new(LogMonitor),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the storage backends
    #[must_use]
    pub fn with_storage(mut self, storage: Vec<Arc<dyn StorageBackend>>) -> Self {
        self.storage = storage;
        self
    }

    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Token that stops the whole run when cancelled
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every task from `dispatcher` to its terminal disposition.
    ///
    /// # Errors
    ///
    /// Returns the first process-level failure (an environment that cannot
    /// host a site visit, or a stage task that died). The remaining stages
    /// are cancelled before returning.
    pub async fn run<D, S>(self, dispatcher: D, sanitizer: S) -> Result<PipelineReport, PipelineError>
    where
        D: Dispatcher + 'static,
        S: Sanitizer + 'static,
    {
        let ctx = Arc::new(PipelineContext {
            transport: self.transport,
            storage: self.storage,
            monitor: self.monitor,
            in_flight: InFlight::new(),
            cancel: self.cancel,
            stats: PipelineStats::default(),
            config: self.config,
        });

        let (fresh_tx, fresh_rx) = mpsc::channel(1);
        let (retry_tx, retry_rx) = mpsc::channel(ctx.config.retry_queue_capacity());
        let (raw_tx, raw_rx) = mpsc::channel(1);
        let (final_tx, final_rx) = mpsc::channel(1);

        info!(
            "Starting pipeline with {} crawler(s) and {} storer(s)",
            ctx.config.crawlers(),
            ctx.config.storers()
        );

        let mut stages: JoinSet<Result<(), PipelineError>> = JoinSet::new();

        stages.spawn(stages::run_intake(
            Arc::clone(&ctx),
            dispatcher,
            sanitizer,
            fresh_tx,
        ));

        spawn_crawl_pool(
            &mut stages,
            &ctx,
            TaskInputs::new(fresh_rx, retry_rx),
            &raw_tx,
        );
        drop(raw_tx);

        stages.spawn(stages::run_postprocessor(raw_rx, final_tx));

        let finals = Arc::new(Mutex::new(final_rx));
        for _ in 0..ctx.config.storers() {
            stages.spawn(coordinator::run_coordinator(
                Arc::clone(&ctx),
                Arc::clone(&finals),
                retry_tx.clone(),
            ));
        }
        drop(retry_tx);

        let mut failure: Option<PipelineError> = None;
        while let Some(joined) = stages.join_next().await {
            let err = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) => PipelineError::Stage {
                    stage: "pipeline",
                    reason: e.to_string(),
                },
            };
            error!("Pipeline stage failed: {err}");
            ctx.cancel.cancel();
            failure.get_or_insert(err);
        }

        let report = ctx.stats.snapshot();
        match failure {
            Some(err) => Err(err),
            None => {
                info!("Pipeline finished: {report:?}");
                Ok(report)
            }
        }
    }
}

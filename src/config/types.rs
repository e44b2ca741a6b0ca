//! Core configuration types for a pipeline run
//!
//! This module contains the `PipelineConfig` struct that carries every tunable
//! of the crawl pool, the site-visit session and the store/retry coordinator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::{
    DEFAULT_CLEANUP_RETRY_DELAY_SECS, DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_NAV_TIMEOUT_SECS,
    DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_STORAGE_BACKOFF_INITIAL_SECS,
    DEFAULT_STORAGE_BACKOFF_MAX_SECS, DEFAULT_STORAGE_BACKOFF_MULTIPLIER,
};

/// Main configuration struct for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of parallel site-visit workers in the crawl pool.
    ///
    /// Fixed for the lifetime of the run. Default: 1
    pub(crate) crawlers: usize,

    /// Number of parallel store/retry coordinator workers. Default: 1
    pub(crate) storers: usize,

    /// How long the navigation command may take to connect to the web server.
    ///
    /// Raced against the task's own overall timeout; whichever fires first wins.
    ///
    /// Default: 30 seconds
    pub(crate) navigation_timeout: Duration,

    /// Upper bound on a graceful browser close.
    ///
    /// When it expires the browser process is killed.
    ///
    /// Default: 5 seconds
    pub(crate) shutdown_grace: Duration,

    /// Capacity of each per-category protocol event queue. Default: 10 000
    pub(crate) event_queue_capacity: usize,

    /// First pause between storage retries. Default: 1 second
    pub(crate) storage_backoff_initial: Duration,

    /// Growth factor applied to the pause after every failed storage attempt.
    /// Default: 5
    pub(crate) storage_backoff_multiplier: u32,

    /// Longest single pause between storage retries.
    ///
    /// Storage is retried without limit on the number of attempts; this only
    /// bounds the delay between two of them.
    ///
    /// Default: 300 seconds
    pub(crate) storage_backoff_max: Duration,

    /// Pause before the second and final attempt to remove a working directory.
    /// Default: 1 second
    pub(crate) cleanup_retry_delay: Duration,

    /// Minimum spacing between two tasks admitted into the pipeline.
    ///
    /// Keeps all parallel browsers from launching at the same instant.
    /// Default: zero (no rate limit)
    pub(crate) intake_interval: Duration,

    /// Root under which per-task working directories are allocated
    pub(crate) temp_root: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crawlers: 1,
            storers: 1,
            navigation_timeout: Duration::from_secs(DEFAULT_NAV_TIMEOUT_SECS),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            storage_backoff_initial: Duration::from_secs(DEFAULT_STORAGE_BACKOFF_INITIAL_SECS),
            storage_backoff_multiplier: DEFAULT_STORAGE_BACKOFF_MULTIPLIER,
            storage_backoff_max: Duration::from_secs(DEFAULT_STORAGE_BACKOFF_MAX_SECS),
            cleanup_retry_delay: Duration::from_secs(DEFAULT_CLEANUP_RETRY_DELAY_SECS),
            intake_interval: Duration::ZERO,
            temp_root: std::env::temp_dir().join("mida"),
        }
    }
}

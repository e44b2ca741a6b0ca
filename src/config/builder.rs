//! Fluent builder for `PipelineConfig`
//!
//! Every field starts from its default; `build()` validates the combination.

use anyhow::{Result, bail};
use std::path::PathBuf;
use std::time::Duration;

use super::types::PipelineConfig;

#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    inner: PipelineConfig,
}

impl PipelineConfig {
    /// Create a builder for configuring a `PipelineConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn crawlers(mut self, crawlers: usize) -> Self {
        self.inner.crawlers = crawlers;
        self
    }

    #[must_use]
    pub fn storers(mut self, storers: usize) -> Self {
        self.inner.storers = storers;
        self
    }

    #[must_use]
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.inner.navigation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.inner.shutdown_grace = grace;
        self
    }

    #[must_use]
    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.inner.event_queue_capacity = capacity;
        self
    }

    /// Set the storage retry schedule: first pause, growth factor and ceiling
    /// on a single pause.
    #[must_use]
    pub fn storage_backoff(mut self, initial: Duration, multiplier: u32, max: Duration) -> Self {
        self.inner.storage_backoff_initial = initial;
        self.inner.storage_backoff_multiplier = multiplier;
        self.inner.storage_backoff_max = max;
        self
    }

    #[must_use]
    pub fn cleanup_retry_delay(mut self, delay: Duration) -> Self {
        self.inner.cleanup_retry_delay = delay;
        self
    }

    #[must_use]
    pub fn intake_interval(mut self, interval: Duration) -> Self {
        self.inner.intake_interval = interval;
        self
    }

    #[must_use]
    pub fn temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.inner.temp_root = root.into();
        self
    }

    /// Validate and produce the configuration.
    ///
    /// # Errors
    ///
    /// Fails when a worker count or the event queue capacity is zero, when the
    /// storage multiplier is zero, or when the temp root is relative.
    pub fn build(self) -> Result<PipelineConfig> {
        let config = self.inner;

        if config.crawlers == 0 {
            bail!("crawlers must be at least 1");
        }
        if config.storers == 0 {
            bail!("storers must be at least 1");
        }
        if config.event_queue_capacity == 0 {
            bail!("event_queue_capacity must be at least 1");
        }
        if config.storage_backoff_multiplier == 0 {
            bail!("storage backoff multiplier must be at least 1");
        }
        if config.storage_backoff_max < config.storage_backoff_initial {
            bail!(
                "storage backoff ceiling ({:?}) is below the initial delay ({:?})",
                config.storage_backoff_max,
                config.storage_backoff_initial
            );
        }
        if !config.temp_root.is_absolute() {
            bail!(
                "temp_root must be an absolute path, got {}",
                config.temp_root.display()
            );
        }

        Ok(config)
    }
}

//! Getter methods for `PipelineConfig`

use std::path::Path;
use std::time::Duration;

use super::types::PipelineConfig;

impl PipelineConfig {
    #[must_use]
    pub fn crawlers(&self) -> usize {
        self.crawlers
    }

    #[must_use]
    pub fn storers(&self) -> usize {
        self.storers
    }

    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    #[must_use]
    pub fn event_queue_capacity(&self) -> usize {
        self.event_queue_capacity
    }

    #[must_use]
    pub fn cleanup_retry_delay(&self) -> Duration {
        self.cleanup_retry_delay
    }

    #[must_use]
    pub fn intake_interval(&self) -> Duration {
        self.intake_interval
    }

    #[must_use]
    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Capacity of the retry edge back into the crawl pool.
    ///
    /// A retry can only be produced by a task that already sits between the
    /// crawl pool and the coordinators, so this is never exceeded and the
    /// coordinator never blocks on a resubmission.
    #[must_use]
    pub fn retry_queue_capacity(&self) -> usize {
        self.crawlers + self.storers + 4
    }

    /// Delay before storage attempt number `attempt + 1` (0-based `attempt`).
    #[must_use]
    pub fn storage_backoff(&self, attempt: u32) -> Duration {
        let factor = self
            .storage_backoff_multiplier
            .checked_pow(attempt)
            .unwrap_or(u32::MAX);
        self.storage_backoff_initial
            .checked_mul(factor)
            .map_or(self.storage_backoff_max, |d| d.min(self.storage_backoff_max))
    }
}

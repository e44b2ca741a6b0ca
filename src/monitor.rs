//! Observability collaborator: receives a summary for every coordinator pass.

use log::{info, warn};

use crate::result::TaskSummary;

pub trait Monitor: Send + Sync {
    fn record(&self, summary: &TaskSummary);
}

/// Logs each summary at `info` (failures at `warn`)
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMonitor;

impl Monitor for LogMonitor {
    fn record(&self, summary: &TaskSummary) {
        let browser_secs = summary
            .timing
            .browser_duration()
            .map_or(0.0, |d| d.num_milliseconds() as f64 / 1000.0);

        if summary.success {
            info!(
                target: "mida::monitor",
                "{} succeeded on attempt {} (browser open {browser_secs:.1}s, output {})",
                summary.url,
                summary.attempt,
                summary.output_path.as_deref().unwrap_or("-")
            );
        } else {
            warn!(
                target: "mida::monitor",
                "{} failed on attempt {}: {} (browser open {browser_secs:.1}s)",
                summary.url, summary.attempt, summary.failure_reason
            );
        }
    }
}

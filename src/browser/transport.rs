//! The seam between a site-visit session and the remote-debugging client.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::events::EventRouter;
use crate::error::{NavigationError, TransportError};
use crate::result::{CookieRecord, CrawlerInfo};
use crate::task::{SanitizedTask, TaskLog};

/// Everything needed to start one browser process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub binary: PathBuf,
    /// `(name, value)` pairs without the leading `--`; `None` for switches
    pub flags: Vec<(String, Option<String>)>,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    /// Upper bound on a single protocol command
    pub request_timeout: Duration,
}

impl LaunchConfig {
    /// Build the launch configuration for a task, skipping malformed flags
    /// with a warning in the task log.
    #[must_use]
    pub fn for_task(task: &SanitizedTask, request_timeout: Duration, log: &TaskLog) -> Self {
        let flags = task
            .browser
            .flags
            .iter()
            .filter_map(|flag| match format_flag(flag) {
                Some(parsed) => Some(parsed),
                None => {
                    log.warn(format!("skipping bad browser flag: {flag}"));
                    None
                }
            })
            .collect();

        Self {
            binary: task.browser.binary.clone(),
            flags,
            user_data_dir: task.user_data_dir(),
            headless: task.browser.headless,
            request_timeout,
        }
    }

    /// Flags back in command-line form (`--name` or `--name=value`)
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        self.flags
            .iter()
            .map(|(name, value)| match value {
                Some(v) => format!("--{name}={v}"),
                None => format!("--{name}"),
            })
            .collect()
    }
}

/// Split a browser flag given as `--name`, `name` or `--name=value`.
///
/// Returns `None` for flags with more than one `=` or an empty name.
#[must_use]
pub fn format_flag(flag: &str) -> Option<(String, Option<String>)> {
    let flag = flag.strip_prefix("--").unwrap_or(flag);
    let mut parts = flag.split('=');
    let name = parts.next().filter(|n| !n.is_empty())?;
    let value = parts.next();
    if parts.next().is_some() {
        return None;
    }
    Some((name.to_string(), value.map(str::to_string)))
}

/// Starts browser processes
#[async_trait]
pub trait BrowserTransport: Send + Sync {
    async fn launch(&self, config: &LaunchConfig)
    -> Result<Arc<dyn BrowserProcess>, TransportError>;
}

/// One running browser, driven over the remote-debugging protocol.
///
/// Every method takes `&self` so a post-load task can capture a screenshot
/// while the session waits on the process in parallel.
#[async_trait]
pub trait BrowserProcess: Send + Sync {
    /// Start forwarding load, request, response and script events to `router`
    async fn subscribe(&self, router: EventRouter) -> Result<(), TransportError>;

    /// Enable the protocol domains a visit needs and report browser metadata
    async fn enable_domains(&self) -> Result<CrawlerInfo, TransportError>;

    /// Navigate the page; resolves once the server connection is established
    async fn navigate(&self, url: &str) -> Result<(), NavigationError>;

    /// Resolves when the process exits or the connection to it drops
    async fn exited(&self);

    async fn capture_screenshot(&self, path: &Path) -> Result<(), TransportError>;

    async fn cookies(&self) -> Result<Vec<CookieRecord>, TransportError>;

    async fn dom_snapshot(&self) -> Result<Value, TransportError>;

    /// Ask the browser to close and wait for the process to exit
    async fn close(&self) -> Result<(), TransportError>;

    /// Terminate the process without asking
    async fn kill(&self);
}

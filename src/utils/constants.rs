//! Shared configuration constants for MIDA
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// How long to wait for the navigation command to connect to the web server.
pub const DEFAULT_NAV_TIMEOUT_SECS: u64 = 30;

/// Upper bound on a graceful browser close before the process is killed.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Capacity of each per-category protocol event queue.
///
/// Large pages emit thousands of network events in a burst; the queue has to
/// absorb them while the consumer holds the result lock.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 10_000;

/// Default overall site visit timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default time to stay on a page after the load event in time-after-load mode (seconds)
pub const DEFAULT_TIME_AFTER_LOAD_SECS: u64 = 5;

/// Upper bound on a site visit timeout and post-load delay (one day)
pub const MAX_SITE_VISIT_SECS: u64 = 86_400;

/// Default number of attempts a task gets before it is abandoned
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

/// First delay between storage retries
pub const DEFAULT_STORAGE_BACKOFF_INITIAL_SECS: u64 = 1;

/// Growth factor between consecutive storage retries
pub const DEFAULT_STORAGE_BACKOFF_MULTIPLIER: u32 = 5;

/// Longest single pause between storage retries
pub const DEFAULT_STORAGE_BACKOFF_MAX_SECS: u64 = 300;

/// Pause before the second attempt at removing a working directory.
///
/// Chromium occasionally still holds files in its profile right after exit.
pub const DEFAULT_CLEANUP_RETRY_DELAY_SECS: u64 = 1;

/// Scheme applied to task URLs that were given without one
pub const DEFAULT_PROTOCOL_PREFIX: &str = "https://";

/// Name of the per-task log file inside the working directory
pub const TASK_LOG_FILE: &str = "task.log";
pub const SCREENSHOT_FILE: &str = "screenshot.png";
pub const METADATA_FILE: &str = "metadata.json";
pub const RESOURCE_METADATA_FILE: &str = "resource_metadata.json";
pub const SCRIPT_METADATA_FILE: &str = "script_metadata.json";
pub const COOKIE_FILE: &str = "cookies.json";
pub const DOM_FILE: &str = "dom.json";

/// Flags applied to every Chromium-based browser launch, ahead of task flags
pub const DEFAULT_CHROMIUM_FLAGS: &[&str] = &[
    "--enable-features=NetworkService",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-client-side-phishing-detection",
    "--disable-extensions",
    "--disable-features=IsolateOrigins,site-per-process",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-infobars",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--disk-cache-size=0",
    "--incognito",
    "--new-window",
    "--no-default-browser-check",
    "--no-first-run",
    "--no-sandbox",
    "--safebrowsing-disable-auto-update",
];

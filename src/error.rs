//! Error types for the MIDA pipeline
//!
//! Task-level failures travel through the pipeline as data (a failure flag
//! plus the `Display` text of the error that ended the attempt). Only
//! environment-level failures surface as `PipelineError` from `Pipeline::run`.

use std::fmt;
use std::path::PathBuf;

/// Rejection of a raw task by the sanitizer. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("task has no URL")]
    MissingUrl,

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("site visit timeout must be greater than zero")]
    ZeroTimeout,

    #[error("{field} of {value}s exceeds the {max}s limit")]
    DurationTooLong {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("time after load must not be negative")]
    NegativeTimeAfterLoad,

    #[error("time after load ({time_after_load}s) exceeds the overall timeout ({timeout}s)")]
    TimeAfterLoadExceedsTimeout { time_after_load: u64, timeout: u64 },

    #[error("max attempts must be at least 1")]
    ZeroMaxAttempts,

    #[error("no Chrome/Chromium executable found")]
    BrowserNotFound,

    #[error("remote output requires both host and path")]
    IncompleteRemoteOutput,

    #[error("task has no enabled output destination")]
    NoDestination,
}

/// Failure reported by a browser transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("protocol command failed: {0}")]
    Command(String),

    #[error("browser connection closed")]
    Closed,
}

/// Why navigation did not complete
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("timeout on connection to webserver")]
    Timeout,

    /// Error text reported by the page itself, e.g. `net::ERR_NAME_NOT_RESOLVED`
    #[error("{0}")]
    PageError(String),

    #[error("navigation command failed: {0}")]
    Protocol(String),
}

/// What cut a site visit short before navigation completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The task's absolute timeout fired
    OverallTimeout,
    /// The browser process exited or the connection to it dropped
    ProcessExited,
    /// The session was cancelled from outside
    Cancelled,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverallTimeout => {
                write!(f, "total site visit time exceeded before we connected to server")
            }
            Self::ProcessExited => write!(f, "browser closed during connection to site"),
            Self::Cancelled => write!(f, "site visit cancelled"),
        }
    }
}

/// Error that ended one site-visit attempt. Counts toward the retry budget.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("failed to enable DevTools domains: {0}")]
    DomainEnable(String),

    #[error("failed to navigate to site: {0}")]
    Navigation(#[from] NavigationError),

    #[error("{0}")]
    Cancelled(CancelReason),
}

/// Failure persisting a final result. Treated as transient by the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("destination {destination} unavailable: {reason}")]
    Destination { destination: String, reason: String },

    #[error("cannot derive output path for {url}: {reason}")]
    OutputPath { url: String, reason: String },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure reading tasks from a task source
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to read task file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse task file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A working directory that could not be removed, even after a retry
#[derive(Debug, thiserror::Error)]
#[error("failed to remove working directory {}: {source}", .path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The host environment cannot support a site visit (misconfiguration)
#[derive(Debug, thiserror::Error)]
#[error("cannot prepare working directory {}: {source}", .path.display())]
pub struct EnvironmentError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Errors that abort a whole pipeline run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    #[error("pipeline stage '{stage}' failed: {reason}")]
    Stage { stage: &'static str, reason: String },
}

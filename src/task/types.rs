//! Task descriptors as they enter the pipeline (`RawTask`) and as they flow
//! through it once resolved (`SanitizedTask`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use super::task_log::TaskLog;

/// Policy deciding when a site visit is finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionCondition {
    /// Finish as soon as the page fires its load event
    LoadEvent,
    /// Stay on the page until the overall timeout, loaded or not
    TimeoutOnly,
    /// Stay for a fixed delay after the load event, bounded by the overall timeout
    TimeAfterLoad,
}

// ---------------------------------------------------------------------------
// Raw (unsanitized) task, every field optional
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTask {
    pub url: Option<String>,
    #[serde(rename = "browser_settings", default)]
    pub browser: Option<RawBrowserSettings>,
    #[serde(rename = "completion_settings", default)]
    pub completion: Option<RawCompletionSettings>,
    #[serde(rename = "data_settings", default)]
    pub data: Option<RawDataSettings>,
    #[serde(rename = "output_settings", default)]
    pub output: Option<RawOutputSettings>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl RawTask {
    /// A raw task with only its URL set; everything else takes defaults
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBrowserSettings {
    pub browser_binary: Option<String>,
    /// Flags appended to the defaults
    pub add_browser_flags: Option<Vec<String>>,
    /// Flags dropped from the defaults
    pub remove_browser_flags: Option<Vec<String>>,
    /// Flags replacing the defaults entirely
    pub set_browser_flags: Option<Vec<String>>,
    pub headless: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCompletionSettings {
    pub completion_condition: Option<CompletionCondition>,
    /// Seconds
    pub timeout: Option<i64>,
    /// Seconds
    pub time_after_load: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDataSettings {
    pub resource_metadata: Option<bool>,
    pub script_metadata: Option<bool>,
    pub cookies: Option<bool>,
    pub dom: Option<bool>,
    pub screenshot: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOutputSettings {
    pub local_output_settings: Option<RawLocalOutput>,
    pub remote_output_settings: Option<RawRemoteOutput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLocalOutput {
    pub enable: Option<bool>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRemoteOutput {
    pub enable: Option<bool>,
    pub host: Option<String>,
    pub path: Option<String>,
}

// ---------------------------------------------------------------------------
// Sanitized task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserSettings {
    pub binary: PathBuf,
    /// Launch flags in their original textual form, defaults already merged
    pub flags: Vec<String>,
    pub headless: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionSettings {
    pub condition: CompletionCondition,
    /// Absolute bound on the whole visit, measured from browser launch
    pub timeout: Duration,
    /// Delay after the load event in `TimeAfterLoad` mode
    pub time_after_load: Duration,
}

/// What telemetry a visit keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSettings {
    pub resource_metadata: bool,
    pub script_metadata: bool,
    pub cookies: bool,
    pub dom: bool,
    pub screenshot: bool,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            resource_metadata: true,
            script_metadata: false,
            cookies: true,
            dom: false,
            screenshot: true,
        }
    }
}

/// Where a final result is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Local { path: PathBuf },
    Remote { host: String, path: String },
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { path } => write!(f, "local:{}", path.display()),
            Self::Remote { host, path } => write!(f, "{host}:{path}"),
        }
    }
}

/// A fully resolved, self-contained task ready for a site visit.
///
/// The session writes the failure fields; the coordinator owns the attempt
/// counters and the failure history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedTask {
    pub id: Uuid,
    pub url: String,
    pub browser: BrowserSettings,
    pub completion: CompletionSettings,
    pub data: DataSettings,
    /// Storage destinations in the order they are written, local first
    pub destinations: Vec<Destination>,

    pub max_attempts: u32,
    /// 1-based
    pub current_attempt: u32,
    pub task_failed: bool,
    pub failure_code: String,
    pub past_failure_codes: Vec<String>,

    /// Exclusive scratch directory for this task (browser profile, artifacts, task log)
    pub working_dir: PathBuf,
}

impl SanitizedTask {
    /// Per-task log sink writing into the working directory
    #[must_use]
    pub fn log(&self) -> TaskLog {
        TaskLog::new(&self.working_dir, &self.url)
    }

    /// Chromium user data directory inside the working directory
    #[must_use]
    pub fn user_data_dir(&self) -> PathBuf {
        self.working_dir.join("profile")
    }

    /// Mark the current attempt as failed with the given code
    pub fn fail(&mut self, code: impl Into<String>) {
        self.task_failed = true;
        self.failure_code = code.into();
    }

    /// Whether a failed task still has attempts left
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.task_failed && self.current_attempt < self.max_attempts
    }

    /// Move the current failure into the history and advance to the next attempt.
    pub fn prepare_retry(&mut self) {
        self.current_attempt += 1;
        self.task_failed = false;
        self.past_failure_codes
            .push(std::mem::take(&mut self.failure_code));
    }
}

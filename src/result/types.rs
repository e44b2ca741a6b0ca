//! Result records produced by a site visit and its postprocessing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::task::SanitizedTask;

/// Wall-clock marks for every phase a task went through.
///
/// `None` means the phase was never reached. Populated marks increase in
/// pipeline order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTiming {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_open: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_established: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_event: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_close: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin_postprocess: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_postprocess: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin_storage: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_storage: Option<DateTime<Utc>>,
}

impl TaskTiming {
    /// All populated marks in pipeline order
    #[must_use]
    pub fn marks(&self) -> Vec<DateTime<Utc>> {
        [
            self.browser_open,
            self.connection_established,
            self.load_event,
            self.browser_close,
            self.begin_postprocess,
            self.end_postprocess,
            self.begin_storage,
            self.end_storage,
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Time the browser was open, when both ends were reached
    #[must_use]
    pub fn browser_duration(&self) -> Option<chrono::Duration> {
        Some(self.browser_close? - self.browser_open?)
    }
}

/// Information about the browser that performed the visit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlerInfo {
    pub browser: String,
    pub browser_version: String,
    pub user_agent: String,
    pub js_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub url: String,
    pub uuid: String,
    pub attempt: u32,
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub failure_reason: String,
    pub timing: TaskTiming,
    pub crawler_info: CrawlerInfo,
    /// Where the result ended up, once stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request_id: String,
    pub frame_id: Option<String>,
    pub url: String,
    pub method: String,
    pub resource_type: Option<String>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub request_id: String,
    pub frame_id: Option<String>,
    pub url: String,
    pub status: i64,
    pub mime_type: String,
    pub remote_ip: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub script_id: String,
    pub url: String,
    pub hash: String,
    pub length: Option<i64>,
    pub execution_context_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: f64,
    pub http_only: bool,
    pub secure: bool,
}

/// Everything a site visit produced, before filtering.
///
/// Event consumers write into it concurrently, always behind the session's
/// single lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub task: SanitizedTask,
    pub summary: TaskSummary,
    /// Requests by request id; redirects add entries under the same id
    pub requests: BTreeMap<String, Vec<RequestRecord>>,
    pub responses: BTreeMap<String, Vec<ResponseRecord>>,
    pub scripts: BTreeMap<String, ScriptRecord>,
    pub cookies: Vec<CookieRecord>,
    pub dom: Option<Value>,
}

impl RawResult {
    #[must_use]
    pub fn new(task: SanitizedTask) -> Self {
        let summary = TaskSummary {
            url: task.url.clone(),
            uuid: task.id.to_string(),
            attempt: task.current_attempt,
            ..TaskSummary::default()
        };
        Self {
            task,
            summary,
            requests: BTreeMap::new(),
            responses: BTreeMap::new(),
            scripts: BTreeMap::new(),
            cookies: Vec::new(),
            dom: None,
        }
    }

    /// Record the reason this attempt failed, on both the summary and the task
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.summary.success = false;
        self.summary.failure_reason.clone_from(&reason);
        self.task.fail(reason);
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn response_count(&self) -> usize {
        self.responses.values().map(Vec::len).sum()
    }
}

/// Requests and responses that share a request id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub requests: Vec<RequestRecord>,
    pub responses: Vec<ResponseRecord>,
}

/// Filtered projection of a `RawResult`, ready for storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub task: SanitizedTask,
    pub summary: TaskSummary,
    pub resources: BTreeMap<String, Resource>,
    pub scripts: BTreeMap<String, ScriptRecord>,
    pub cookies: Vec<CookieRecord>,
    pub dom: Option<Value>,
}

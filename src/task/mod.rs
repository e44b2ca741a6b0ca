//! Task descriptors, sanitization and the per-task log sink

pub mod task_log;
pub mod sanitize;
pub mod types;

pub use task_log::TaskLog;
pub use sanitize::{DefaultSanitizer, Sanitizer, find_browser_executable};
pub use types::{
    BrowserSettings, CompletionCondition, CompletionSettings, DataSettings, Destination,
    RawBrowserSettings, RawCompletionSettings, RawDataSettings, RawLocalOutput,
    RawOutputSettings, RawRemoteOutput, RawTask, SanitizedTask,
};

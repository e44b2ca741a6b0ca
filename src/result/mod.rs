//! Raw and final result records

pub mod types;

pub use types::{
    CookieRecord, CrawlerInfo, FinalResult, RawResult, RequestRecord, Resource, ResponseRecord,
    ScriptRecord, TaskSummary, TaskTiming,
};

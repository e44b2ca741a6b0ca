//! MIDA: a distributed web-measurement crawler.
//!
//! Tasks flow `Dispatcher → Sanitizer → Crawl Pool → Postprocessor →
//! Store/Retry Coordinator`. Each crawl drives one instrumented browser
//! through a site-visit session and captures network, script, cookie and
//! DOM telemetry.

pub mod browser;
pub mod config;
pub mod crawl_engine;
pub mod dispatch;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod postprocess;
pub mod result;
pub mod storage;
pub mod task;
pub mod utils;

pub use browser::{BrowserProcess, BrowserTransport, ChromiumTransport, ProtocolEvent};
pub use config::PipelineConfig;
pub use crawl_engine::visit;
pub use dispatch::{Dispatcher, FileDispatcher, VecDispatcher};
pub use error::{PipelineError, SessionError, StorageError, ValidationError};
pub use monitor::{LogMonitor, Monitor};
pub use pipeline::{Pipeline, PipelineReport};
pub use postprocess::{postprocess, project};
pub use result::{FinalResult, RawResult, TaskSummary};
pub use storage::{LocalStorage, StorageBackend};
pub use task::{DefaultSanitizer, RawTask, SanitizedTask, Sanitizer};

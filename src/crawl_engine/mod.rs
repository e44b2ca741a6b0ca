//! Crawl Engine Module
//!
//! The site-visit session state machine, the event consumers and post-load
//! actions it runs, browser/working-directory cleanup, and the crawl pool
//! that runs sessions in parallel.

// Sub-modules
pub mod cleanup;
pub(crate) mod consumers;
pub mod pool;
pub(crate) mod post_load;
pub mod session;

// Re-exports for public API
pub use cleanup::{CleanupResult, remove_working_dir, shutdown_browser};
pub use session::{SessionState, visit};

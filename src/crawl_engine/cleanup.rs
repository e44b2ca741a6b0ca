//! Browser shutdown and working-directory cleanup
//!
//! A browser is first asked to close and given a bounded grace period; past
//! that it is killed. Working directories get one retry, since Chromium can
//! hold profile files for a moment after exit.

use log::{debug, warn};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use crate::browser::BrowserProcess;
use crate::error::CleanupError;

/// Result of cleanup operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupResult {
    /// All cleanup operations succeeded
    Success,
    /// Some cleanup operations failed, with error details
    PartialFailure(Vec<String>),
}

/// Close the browser gracefully within `grace`, killing it otherwise
pub async fn shutdown_browser(process: &dyn BrowserProcess, grace: Duration) -> CleanupResult {
    let mut errors = Vec::new();

    debug!(target: "mida::cleanup", "Closing browser");
    match tokio::time::timeout(grace, process.close()).await {
        Ok(Ok(())) => {
            debug!(target: "mida::cleanup", "Browser closed gracefully");
            return CleanupResult::Success;
        }
        Ok(Err(e)) => {
            warn!(target: "mida::cleanup", "Failed to close browser: {e}");
            errors.push(format!("Browser close failed: {e}"));
        }
        Err(_) => {
            warn!(target: "mida::cleanup", "Browser did not close within {grace:?}");
            errors.push(format!("Browser close timed out after {grace:?}"));
        }
    }

    debug!(target: "mida::cleanup", "Killing browser process");
    process.kill().await;
    CleanupResult::PartialFailure(errors)
}

/// Remove a working directory, retrying once after `retry_delay`.
///
/// A directory that is already gone counts as removed.
///
/// # Errors
///
/// Returns `CleanupError` when the second attempt fails too.
pub async fn remove_working_dir(path: &Path, retry_delay: Duration) -> Result<(), CleanupError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!(target: "mida::cleanup", "Removed working directory {}", path.display());
            return Ok(());
        }
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            warn!(
                target: "mida::cleanup",
                "Failed to remove working directory {} ({e}), retrying in {retry_delay:?}",
                path.display()
            );
        }
    }

    tokio::time::sleep(retry_delay).await;
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CleanupError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

//! Per-task log sink.
//!
//! Lines go to the `log` facade (tagged with the task URL) right away and are
//! buffered for `task.log` inside the task's working directory, so the stored
//! result carries its own history. `flush` appends the buffer without blocking
//! the runtime. File writes are best effort.

use log::Level;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::utils::TASK_LOG_FILE;

/// Cloned handles share one buffer.
#[derive(Debug, Clone)]
pub struct TaskLog {
    path: PathBuf,
    url: String,
    pending: Arc<Mutex<Vec<String>>>,
}

impl TaskLog {
    #[must_use]
    pub fn new(working_dir: &Path, url: &str) -> Self {
        Self {
            path: working_dir.join(TASK_LOG_FILE),
            url: url.to_string(),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Location of the log file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn debug(&self, msg: impl AsRef<str>) {
        self.write(Level::Debug, msg.as_ref());
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.write(Level::Info, msg.as_ref());
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.write(Level::Warn, msg.as_ref());
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.write(Level::Error, msg.as_ref());
    }

    fn write(&self, level: Level, msg: &str) {
        log::log!(target: "mida::task", level, "[{}] {}", self.url, msg);
        self.pending.lock().push(format!(
            "{} [{}] {}\n",
            chrono::Utc::now().to_rfc3339(),
            level,
            msg
        ));
    }

    /// Append buffered lines to the log file.
    ///
    /// Lines are dropped when the working directory is missing (not yet
    /// created, or already cleaned up).
    pub async fn flush(&self) {
        let lines = std::mem::take(&mut *self.pending.lock());
        if lines.is_empty() {
            return;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await;
        let mut file = match file {
            Ok(file) => file,
            Err(e) => {
                log::debug!(target: "mida::task", "[{}] task log not written: {e}", self.url);
                return;
            }
        };
        if let Err(e) = file.write_all(lines.concat().as_bytes()).await {
            log::debug!(target: "mida::task", "[{}] task log not written: {e}", self.url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_lines_to_task_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = TaskLog::new(dir.path(), "https://example.com/");

        log.info("first");
        log.clone().warn("second");
        assert!(!log.path().exists(), "nothing is written before a flush");
        log.flush().await;
        log.error("third");
        log.flush().await;

        let contents = std::fs::read_to_string(log.path()).expect("task.log written");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("[INFO] first"));
        assert!(lines[1].ends_with("[WARN] second"));
        assert!(lines[2].ends_with("[ERROR] third"));
    }

    #[tokio::test]
    async fn missing_directory_is_ignored() {
        let log = TaskLog::new(Path::new("/nonexistent/mida/dir"), "https://example.com/");
        log.error("dropped on the floor");
        log.flush().await;
        assert!(!log.path().exists());
    }
}

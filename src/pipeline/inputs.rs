//! The crawl pool's two input edges.
//!
//! Fresh tasks come from intake; retries come back from the coordinators on a
//! separate bounded edge. Workers take retries first.

use tokio::sync::mpsc;

use crate::task::SanitizedTask;

#[derive(Debug)]
pub struct TaskInputs {
    retry: mpsc::Receiver<SanitizedTask>,
    fresh: mpsc::Receiver<SanitizedTask>,
}

impl TaskInputs {
    #[must_use]
    pub fn new(
        fresh: mpsc::Receiver<SanitizedTask>,
        retry: mpsc::Receiver<SanitizedTask>,
    ) -> Self {
        Self { retry, fresh }
    }

    /// Next task to crawl, or `None` once intake has closed the fresh edge.
    ///
    /// Intake only closes it after the in-flight count reached zero, at which
    /// point the retry edge is empty too.
    pub async fn next(&mut self) -> Option<SanitizedTask> {
        tokio::select! {
            biased;
            Some(task) = self.retry.recv() => Some(task),
            task = self.fresh.recv() => task,
        }
    }
}

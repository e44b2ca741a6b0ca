//! Pipeline-wide count of admitted-but-not-terminal task passes.
//!
//! Intake adds one per admitted task, the coordinator adds one per retry
//! before resubmitting, and every coordinator pass ends with one `done`.
//! Once the source is exhausted, reaching zero means nothing can re-enter
//! the crawl pool and the stages can be closed in order.

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct InFlight {
    count: watch::Sender<usize>,
}

impl Default for InFlight {
    fn default() -> Self {
        Self::new()
    }
}

impl InFlight {
    #[must_use]
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self { count }
    }

    pub fn add(&self, n: usize) {
        self.count.send_modify(|c| *c += n);
    }

    pub fn done(&self) {
        self.count.send_modify(|c| {
            debug_assert!(*c > 0, "in-flight counter underflow");
            *c = c.saturating_sub(1);
        });
    }

    #[must_use]
    pub fn get(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolve once the count reaches zero
    pub async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|c| *c == 0).await;
    }
}

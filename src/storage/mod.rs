//! Storage collaborators.
//!
//! A backend declares which destinations it accepts and persists a final
//! result there. `store` must be safe to call again after a failure; the
//! coordinator retries it with backoff until it succeeds.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::result::FinalResult;
use crate::task::{Destination, SanitizedTask};

pub mod local;

pub use local::LocalStorage;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    fn accepts(&self, destination: &Destination) -> bool;

    /// Persist `result` at `destination`, returning where it ended up
    async fn store(
        &self,
        result: &FinalResult,
        destination: &Destination,
    ) -> Result<String, StorageError>;

    /// Release anything the backend holds for `task` once it reached its
    /// terminal disposition
    async fn cleanup(&self, _task: &SanitizedTask) -> Result<(), StorageError> {
        Ok(())
    }
}

//! Task sources feeding the pipeline

use async_trait::async_trait;
use log::info;
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use std::path::Path;

use crate::error::DispatchError;
use crate::task::RawTask;

/// Yields raw tasks until the source is exhausted
#[async_trait]
pub trait Dispatcher: Send {
    async fn next(&mut self) -> Option<RawTask>;
}

/// In-memory task source
#[derive(Debug, Clone, Default)]
pub struct VecDispatcher {
    tasks: VecDeque<RawTask>,
}

impl VecDispatcher {
    #[must_use]
    pub fn new(tasks: impl IntoIterator<Item = RawTask>) -> Self {
        Self {
            tasks: tasks.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl Dispatcher for VecDispatcher {
    async fn next(&mut self) -> Option<RawTask> {
        self.tasks.pop_front()
    }
}

/// Task source backed by a JSON file holding an array of raw tasks
#[derive(Debug, Clone)]
pub struct FileDispatcher {
    inner: VecDispatcher,
}

impl FileDispatcher {
    /// Load every task from `path`, optionally in random order
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not a JSON array of tasks.
    pub fn open(path: &Path, shuffle: bool) -> Result<Self, DispatchError> {
        let contents = std::fs::read_to_string(path).map_err(|source| DispatchError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut tasks: Vec<RawTask> =
            serde_json::from_str(&contents).map_err(|source| DispatchError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if shuffle {
            tasks.shuffle(&mut rand::rng());
        }
        info!("Loaded {} tasks from {}", tasks.len(), path.display());

        Ok(Self {
            inner: VecDispatcher::new(tasks),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl Dispatcher for FileDispatcher {
    async fn next(&mut self) -> Option<RawTask> {
        self.inner.next().await
    }
}

//! Local filesystem storage
//!
//! Results land in `<path>/<dir name from url>/<task uuid>/`, one JSON file
//! per captured data set, plus the screenshot and task log copied from the
//! working directory.

use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::StorageBackend;
use crate::error::StorageError;
use crate::result::{FinalResult, TaskSummary};
use crate::task::{Destination, SanitizedTask};
use crate::utils::{
    COOKIE_FILE, DOM_FILE, METADATA_FILE, RESOURCE_METADATA_FILE, SCREENSHOT_FILE,
    SCRIPT_METADATA_FILE, TASK_LOG_FILE, dir_name_from_url,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Directory a task's results are written to under `root`
    ///
    /// # Errors
    ///
    /// Fails when no directory name can be derived from the task URL.
    pub fn result_dir(root: &Path, task: &SanitizedTask) -> Result<PathBuf, StorageError> {
        let name = dir_name_from_url(&task.url).map_err(|e| StorageError::OutputPath {
            url: task.url.clone(),
            reason: e.to_string(),
        })?;
        Ok(root.join(name).join(task.id.to_string()))
    }
}

#[derive(Serialize)]
struct Metadata<'a> {
    summary: &'a TaskSummary,
    task: &'a SanitizedTask,
}

async fn write_json<T: Serialize + ?Sized>(path: PathBuf, value: &T) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// Copy `name` from the working directory if it exists there
async fn copy_artifact(working_dir: &Path, out_dir: &Path, name: &str) -> Result<(), StorageError> {
    let src = working_dir.join(name);
    if tokio::fs::try_exists(&src).await? {
        tokio::fs::copy(&src, out_dir.join(name)).await?;
    }
    Ok(())
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn name(&self) -> &str {
        "local"
    }

    fn accepts(&self, destination: &Destination) -> bool {
        matches!(destination, Destination::Local { .. })
    }

    async fn store(
        &self,
        result: &FinalResult,
        destination: &Destination,
    ) -> Result<String, StorageError> {
        let Destination::Local { path } = destination else {
            return Err(StorageError::Destination {
                destination: destination.to_string(),
                reason: "not a local destination".into(),
            });
        };

        let task = &result.task;
        let out_dir = Self::result_dir(path, task)?;
        tokio::fs::create_dir_all(&out_dir).await?;
        let output_path = out_dir.display().to_string();

        let mut summary = result.summary.clone();
        summary.output_path = Some(output_path.clone());
        write_json(
            out_dir.join(METADATA_FILE),
            &Metadata {
                summary: &summary,
                task,
            },
        )
        .await?;

        if task.data.resource_metadata {
            write_json(out_dir.join(RESOURCE_METADATA_FILE), &result.resources).await?;
        }
        if task.data.script_metadata {
            write_json(out_dir.join(SCRIPT_METADATA_FILE), &result.scripts).await?;
        }
        if task.data.cookies {
            write_json(out_dir.join(COOKIE_FILE), &result.cookies).await?;
        }
        if let Some(dom) = &result.dom {
            write_json(out_dir.join(DOM_FILE), dom).await?;
        }
        if task.data.screenshot {
            copy_artifact(&task.working_dir, &out_dir, SCREENSHOT_FILE).await?;
        }
        copy_artifact(&task.working_dir, &out_dir, TASK_LOG_FILE).await?;

        debug!(target: "mida::storage", "Stored {} to {output_path}", task.url);
        Ok(output_path)
    }
}

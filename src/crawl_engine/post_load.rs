//! Best-effort actions run once the page has loaded.
//!
//! Screenshot, cookies and DOM capture run as child futures of one post-load
//! task and are all joined (or cancelled together) before it finishes.
//! Failures are logged to the task log and otherwise ignored.

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::browser::BrowserProcess;
use crate::result::RawResult;
use crate::task::{DataSettings, TaskLog};
use crate::utils::SCREENSHOT_FILE;

pub(crate) struct PostLoad {
    pub process: Arc<dyn BrowserProcess>,
    pub shared: Arc<Mutex<RawResult>>,
    pub data: DataSettings,
    pub working_dir: PathBuf,
    pub log: TaskLog,
}

impl PostLoad {
    pub(crate) async fn run(self, cancel: CancellationToken) {
        let Self {
            process,
            shared,
            data,
            working_dir,
            log,
        } = self;

        let screenshot = async {
            if !data.screenshot {
                return;
            }
            let path = working_dir.join(SCREENSHOT_FILE);
            match process.capture_screenshot(&path).await {
                Ok(()) => log.debug("captured screenshot"),
                Err(e) => log.warn(format!("failed to capture screenshot: {e}")),
            }
        };

        let cookies = async {
            if !data.cookies {
                return;
            }
            match process.cookies().await {
                Ok(cookies) => {
                    log.debug(format!("collected {} cookies", cookies.len()));
                    shared.lock().cookies = cookies;
                }
                Err(e) => log.warn(format!("failed to get cookies: {e}")),
            }
        };

        let dom = async {
            if !data.dom {
                return;
            }
            match process.dom_snapshot().await {
                Ok(dom) => shared.lock().dom = Some(dom),
                Err(e) => log.warn(format!("failed to get DOM: {e}")),
            }
        };

        tokio::select! {
            _ = async { tokio::join!(screenshot, cookies, dom) } => {
                log.debug("post-load actions finished");
            }
            () = cancel.cancelled() => {
                log.debug("post-load actions cancelled");
            }
        }
    }
}

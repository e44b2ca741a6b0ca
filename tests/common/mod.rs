//! Test utilities for the mida test suite: a scripted browser transport,
//! recording storage and monitor, and task helpers.

use async_trait::async_trait;
use mida::browser::{BrowserProcess, BrowserTransport, EventRouter, LaunchConfig, ProtocolEvent};
use mida::error::{NavigationError, StorageError, TransportError};
use mida::result::{CookieRecord, CrawlerInfo, FinalResult, RequestRecord, ResponseRecord, ScriptRecord, TaskSummary};
use mida::task::{
    CompletionCondition, DefaultSanitizer, Destination, RawCompletionSettings, RawTask,
    SanitizedTask, Sanitizer,
};
use mida::{Monitor, StorageBackend};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// How a scripted browser behaves. Delays are measured from the call that
/// triggers them (launch, navigate).
#[derive(Debug, Clone, Default)]
#[allow(dead_code)]
pub struct Script {
    pub launch_delay: Duration,
    pub launch_error: Option<TransportError>,
    pub enable_error: Option<TransportError>,
    pub nav_delay: Duration,
    pub nav_error: Option<NavigationError>,
    /// Apply `nav_error` only to the first this-many navigations
    pub failing_navigations: Option<usize>,
    /// Fire the load event this long after navigation succeeds
    pub load_after: Option<Duration>,
    /// Deliver the load event before `navigate` returns
    pub load_during_navigate: bool,
    /// Delivered concurrently, one task per event, right after navigation
    pub events: Vec<ProtocolEvent>,
    /// The process dies this long after navigation succeeds
    pub exit_after: Option<Duration>,
    /// `close` never returns, forcing a kill
    pub close_hangs: bool,
}

/// Calls observed across every process a transport launched
#[derive(Debug, Default)]
#[allow(dead_code)]
pub struct Calls {
    pub launches: AtomicUsize,
    pub navigations: AtomicUsize,
    pub closes: AtomicUsize,
    pub kills: AtomicUsize,
    pub screenshots: AtomicUsize,
}

#[allow(dead_code)]
impl Calls {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn screenshots(&self) -> usize {
        self.screenshots.load(Ordering::SeqCst)
    }
}

#[allow(dead_code)]
pub struct ScriptedTransport {
    script: Script,
    pub calls: Arc<Calls>,
    pub launch_configs: Mutex<Vec<LaunchConfig>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(Calls::default()),
            launch_configs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BrowserTransport for ScriptedTransport {
    async fn launch(
        &self,
        config: &LaunchConfig,
    ) -> Result<Arc<dyn BrowserProcess>, TransportError> {
        self.calls.launches.fetch_add(1, Ordering::SeqCst);
        self.launch_configs.lock().push(config.clone());
        tokio::time::sleep(self.script.launch_delay).await;
        if let Some(e) = self.script.launch_error.clone() {
            return Err(e);
        }
        Ok(Arc::new(ScriptedProcess {
            script: self.script.clone(),
            calls: Arc::clone(&self.calls),
            router: Mutex::new(None),
            exited: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }))
    }
}

struct ScriptedProcess {
    script: Script,
    calls: Arc<Calls>,
    router: Mutex<Option<EventRouter>>,
    exited: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ScriptedProcess {
    fn stop(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.router.lock().take();
        self.exited.cancel();
    }
}

#[async_trait]
impl BrowserProcess for ScriptedProcess {
    async fn subscribe(&self, router: EventRouter) -> Result<(), TransportError> {
        *self.router.lock() = Some(router);
        Ok(())
    }

    async fn enable_domains(&self) -> Result<CrawlerInfo, TransportError> {
        if let Some(e) = self.script.enable_error.clone() {
            return Err(e);
        }
        Ok(CrawlerInfo {
            browser: "ScriptedChrome".into(),
            browser_version: "ScriptedChrome/1.0".into(),
            user_agent: "Mozilla/5.0 (Scripted)".into(),
            js_version: "1.0".into(),
        })
    }

    async fn navigate(&self, _url: &str) -> Result<(), NavigationError> {
        let seen = self.calls.navigations.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.script.nav_delay).await;
        if let Some(e) = self.script.nav_error.clone()
            && self.script.failing_navigations.is_none_or(|limit| seen < limit)
        {
            return Err(e);
        }

        if self.script.load_during_navigate {
            let router = self.router.lock().clone();
            if let Some(router) = router {
                let _ = router
                    .deliver(ProtocolEvent::LoadEventFired { timestamp: 0.5 })
                    .await;
                // Let the load consumer stamp the event before the reply
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }

        let Some(router) = self.router.lock().clone() else {
            return Ok(());
        };
        let mut tasks = self.tasks.lock();

        for event in self.script.events.iter().cloned() {
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                let _ = router.deliver(event).await;
            }));
        }
        if let Some(after) = self.script.load_after {
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let _ = router
                    .deliver(ProtocolEvent::LoadEventFired { timestamp: 1.0 })
                    .await;
            }));
        }
        if let Some(after) = self.script.exit_after {
            let exited = self.exited.clone();
            tasks.push(tokio::spawn(async move {
                tokio::time::sleep(after).await;
                exited.cancel();
            }));
        }
        Ok(())
    }

    async fn exited(&self) {
        self.exited.cancelled().await;
    }

    async fn capture_screenshot(&self, path: &Path) -> Result<(), TransportError> {
        self.calls.screenshots.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(path, b"\x89PNG scripted")
            .await
            .map_err(|e| TransportError::Command(e.to_string()))
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>, TransportError> {
        Ok(vec![CookieRecord {
            name: "session".into(),
            value: "abc".into(),
            domain: "example.com".into(),
            path: "/".into(),
            expires: -1.0,
            http_only: true,
            secure: true,
        }])
    }

    async fn dom_snapshot(&self) -> Result<serde_json::Value, TransportError> {
        Ok(serde_json::json!({ "nodeName": "#document", "children": [] }))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        if self.script.close_hangs {
            std::future::pending::<()>().await;
        }
        self.stop();
        Ok(())
    }

    async fn kill(&self) {
        self.calls.kills.fetch_add(1, Ordering::SeqCst);
        self.stop();
    }
}

/// Storage backend that keeps every result in memory, optionally failing
/// the first few writes
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingStorage {
    fail_first: AtomicUsize,
    pub attempts: AtomicUsize,
    pub stored: Mutex<Vec<FinalResult>>,
}

#[allow(dead_code)]
impl RecordingStorage {
    pub fn failing(times: usize) -> Self {
        Self {
            fail_first: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Vec<FinalResult> {
        self.stored.lock().clone()
    }
}

#[async_trait]
impl StorageBackend for RecordingStorage {
    fn name(&self) -> &str {
        "recording"
    }

    fn accepts(&self, _destination: &Destination) -> bool {
        true
    }

    async fn store(
        &self,
        result: &FinalResult,
        destination: &Destination,
    ) -> Result<String, StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::Destination {
                destination: destination.to_string(),
                reason: "scripted outage".into(),
            });
        }
        self.stored.lock().push(result.clone());
        Ok(format!("memory://{}", result.summary.uuid))
    }
}

#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingMonitor {
    pub summaries: Mutex<Vec<TaskSummary>>,
}

#[allow(dead_code)]
impl RecordingMonitor {
    pub fn summaries(&self) -> Vec<TaskSummary> {
        self.summaries.lock().clone()
    }
}

impl Monitor for RecordingMonitor {
    fn record(&self, summary: &TaskSummary) {
        self.summaries.lock().push(summary.clone());
    }
}

/// A sanitizer that never looks for a real browser
#[allow(dead_code)]
pub fn sanitizer(temp_root: &Path) -> DefaultSanitizer {
    DefaultSanitizer::new(temp_root)
        .local_output(temp_root.join("results"))
        .browser_binary("/opt/scripted/chrome")
}

#[allow(dead_code)]
pub fn raw_task(url: &str, condition: CompletionCondition, timeout: i64, time_after_load: i64) -> RawTask {
    let mut raw = RawTask::with_url(url);
    raw.completion = Some(RawCompletionSettings {
        completion_condition: Some(condition),
        timeout: Some(timeout),
        time_after_load: Some(time_after_load),
    });
    raw
}

/// A sanitized task whose working directory lives under `temp_root`
#[allow(dead_code)]
pub fn task(
    temp_root: &Path,
    condition: CompletionCondition,
    timeout: i64,
    time_after_load: i64,
) -> SanitizedTask {
    sanitizer(temp_root)
        .sanitize(raw_task("https://example.com/", condition, timeout, time_after_load))
        .expect("valid task")
}

#[allow(dead_code)]
pub fn request(id: &str, url: &str) -> ProtocolEvent {
    ProtocolEvent::RequestWillBeSent(RequestRecord {
        request_id: id.into(),
        frame_id: Some("frame-1".into()),
        url: url.into(),
        method: "GET".into(),
        resource_type: Some("Document".into()),
        timestamp: 1.0,
    })
}

#[allow(dead_code)]
pub fn response(id: &str, url: &str) -> ProtocolEvent {
    ProtocolEvent::ResponseReceived(ResponseRecord {
        request_id: id.into(),
        frame_id: Some("frame-1".into()),
        url: url.into(),
        status: 200,
        mime_type: "text/html".into(),
        remote_ip: Some("93.184.216.34".into()),
        headers: BTreeMap::from([("content-type".to_string(), "text/html".to_string())]),
        timestamp: 1.5,
    })
}

#[allow(dead_code)]
pub fn script(id: &str) -> ProtocolEvent {
    ProtocolEvent::ScriptParsed(ScriptRecord {
        script_id: id.into(),
        url: format!("https://example.com/{id}.js"),
        hash: format!("hash-{id}"),
        length: Some(128),
        execution_context_id: 1,
    })
}

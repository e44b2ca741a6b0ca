//! `BrowserTransport` backed by chromiumoxide.
//!
//! Launches Chromium with the task's flags, drives the CDP handler on its own
//! task and forwards the events a session consumes as `ProtocolEvent`s.

use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::browser::GetVersionParams;
use chromiumoxide::cdp::browser_protocol::dom::GetDocumentParams;
use chromiumoxide::cdp::browser_protocol::network::{
    self, EventRequestWillBeSent, EventResponseReceived,
};
use chromiumoxide::cdp::browser_protocol::page::{
    self, CaptureScreenshotFormat, CaptureScreenshotParams, EventLoadEventFired, NavigateParams,
};
use chromiumoxide::cdp::js_protocol::debugger::{self, EventScriptParsed};
use chromiumoxide::page::Page;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::events::{EventRouter, ProtocolEvent};
use super::transport::{BrowserProcess, BrowserTransport, LaunchConfig};
use crate::error::{NavigationError, TransportError};
use crate::result::{CookieRecord, CrawlerInfo, RequestRecord, ResponseRecord, ScriptRecord};

#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumTransport;

impl ChromiumTransport {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserTransport for ChromiumTransport {
    async fn launch(
        &self,
        config: &LaunchConfig,
    ) -> Result<Arc<dyn BrowserProcess>, TransportError> {
        let process = launch_chromium(config)
            .await
            .map_err(|e| TransportError::Launch(format!("{e:#}")))?;
        Ok(Arc::new(process))
    }
}

async fn launch_chromium(config: &LaunchConfig) -> anyhow::Result<ChromiumProcess> {
    tokio::fs::create_dir_all(&config.user_data_dir)
        .await
        .context("Failed to create user data directory")?;

    let mut builder = BrowserConfigBuilder::default()
        .request_timeout(config.request_timeout)
        .user_data_dir(config.user_data_dir.clone())
        .chrome_executable(config.binary.clone())
        .disable_default_args()
        .args(config.args());

    builder = if config.headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    let browser_config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    debug!("Launching browser with config: {:?}", browser_config);
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let exited = CancellationToken::new();
    let handler_exited = exited.clone();
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                let error_msg = e.to_string();

                // chromiumoxide does not know every CDP message Chromium sends
                let is_benign_serialization_error = error_msg
                    .contains("data did not match any variant of untagged enum Message")
                    || error_msg.contains("Failed to deserialize WS response");

                if is_benign_serialization_error {
                    trace!("Suppressed benign CDP serialization error: {}", error_msg);
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        info!("Browser handler task completed");
        handler_exited.cancel();
    });

    let page = match browser.new_page("about:blank").await {
        Ok(page) => page,
        Err(e) => {
            handler_task.abort();
            return Err(anyhow::Error::new(e).context("Failed to open page"));
        }
    };

    Ok(ChromiumProcess {
        browser: tokio::sync::Mutex::new(browser),
        page,
        exited,
        handler: handler_task,
        forwarders: parking_lot::Mutex::new(Vec::new()),
    })
}

struct ChromiumProcess {
    browser: tokio::sync::Mutex<Browser>,
    page: Page,
    exited: CancellationToken,
    handler: JoinHandle<()>,
    forwarders: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for ChromiumProcess {
    fn drop(&mut self) {
        for forwarder in self.forwarders.lock().drain(..) {
            forwarder.abort();
        }
        self.handler.abort();
    }
}

fn command_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::Command(e.to_string())
}

/// Pump a CDP event stream into the router until either side closes
fn forward<S, T, F>(stream: S, router: EventRouter, convert: F) -> JoinHandle<()>
where
    S: Stream<Item = Arc<T>> + Send + Unpin + 'static,
    T: Send + Sync + 'static,
    F: Fn(&T) -> ProtocolEvent + Send + 'static,
{
    tokio::spawn(async move {
        let mut stream = stream;
        while let Some(event) = stream.next().await {
            if router.deliver(convert(&event)).await.is_err() {
                break;
            }
        }
    })
}

fn header_map(headers: &network::Headers) -> BTreeMap<String, String> {
    match headers.inner() {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let v = v.as_str().map_or_else(|| v.to_string(), str::to_string);
                (k.clone(), v)
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn request_record(ev: &EventRequestWillBeSent) -> ProtocolEvent {
    ProtocolEvent::RequestWillBeSent(RequestRecord {
        request_id: ev.request_id.inner().clone(),
        frame_id: ev.frame_id.as_ref().map(|f| f.inner().clone()),
        url: ev.request.url.clone(),
        method: ev.request.method.clone(),
        resource_type: ev.r#type.as_ref().map(|t| format!("{t:?}")),
        timestamp: *ev.timestamp.inner(),
    })
}

fn response_record(ev: &EventResponseReceived) -> ProtocolEvent {
    ProtocolEvent::ResponseReceived(ResponseRecord {
        request_id: ev.request_id.inner().clone(),
        frame_id: ev.frame_id.as_ref().map(|f| f.inner().clone()),
        url: ev.response.url.clone(),
        status: ev.response.status,
        mime_type: ev.response.mime_type.clone(),
        remote_ip: ev.response.remote_ip_address.clone(),
        headers: header_map(&ev.response.headers),
        timestamp: *ev.timestamp.inner(),
    })
}

fn script_record(ev: &EventScriptParsed) -> ProtocolEvent {
    ProtocolEvent::ScriptParsed(ScriptRecord {
        script_id: ev.script_id.inner().clone(),
        url: ev.url.clone(),
        hash: ev.hash.clone(),
        length: ev.length,
        execution_context_id: *ev.execution_context_id.inner(),
    })
}

#[async_trait]
impl BrowserProcess for ChromiumProcess {
    async fn subscribe(&self, router: EventRouter) -> Result<(), TransportError> {
        let loads = self
            .page
            .event_listener::<EventLoadEventFired>()
            .await
            .map_err(command_error)?;
        let requests = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(command_error)?;
        let responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(command_error)?;
        let scripts = self
            .page
            .event_listener::<EventScriptParsed>()
            .await
            .map_err(command_error)?;

        let mut forwarders = self.forwarders.lock();
        forwarders.push(forward(loads, router.clone(), |ev: &EventLoadEventFired| {
            ProtocolEvent::LoadEventFired {
                timestamp: *ev.timestamp.inner(),
            }
        }));
        forwarders.push(forward(requests, router.clone(), request_record));
        forwarders.push(forward(responses, router.clone(), response_record));
        forwarders.push(forward(scripts, router, script_record));
        Ok(())
    }

    async fn enable_domains(&self) -> Result<CrawlerInfo, TransportError> {
        self.page
            .execute(network::EnableParams::default())
            .await
            .map_err(command_error)?;
        self.page
            .execute(page::EnableParams::default())
            .await
            .map_err(command_error)?;
        self.page
            .execute(debugger::EnableParams::default())
            .await
            .map_err(command_error)?;

        let version = self
            .page
            .execute(GetVersionParams {})
            .await
            .map_err(command_error)?;

        Ok(CrawlerInfo {
            browser: version.product.clone(),
            browser_version: version.revision.clone(),
            user_agent: version.user_agent.clone(),
            js_version: version.js_version.clone(),
        })
    }

    async fn navigate(&self, url: &str) -> Result<(), NavigationError> {
        let result = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| NavigationError::Protocol(e.to_string()))?;

        match &result.error_text {
            Some(text) if !text.is_empty() => Err(NavigationError::PageError(text.clone())),
            _ => Ok(()),
        }
    }

    async fn exited(&self) {
        self.exited.cancelled().await;
    }

    async fn capture_screenshot(&self, path: &Path) -> Result<(), TransportError> {
        let params = CaptureScreenshotParams {
            format: Some(CaptureScreenshotFormat::Png),
            ..Default::default()
        };
        let data = self.page.screenshot(params).await.map_err(command_error)?;
        tokio::fs::write(path, data).await.map_err(command_error)
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>, TransportError> {
        let cookies = self.page.get_cookies().await.map_err(command_error)?;
        Ok(cookies
            .into_iter()
            .map(|c| CookieRecord {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: c.expires,
                http_only: c.http_only,
                secure: c.secure,
            })
            .collect())
    }

    async fn dom_snapshot(&self) -> Result<Value, TransportError> {
        let doc = self
            .page
            .execute(GetDocumentParams {
                depth: Some(-1),
                pierce: Some(true),
            })
            .await
            .map_err(command_error)?;
        serde_json::to_value(&doc.root).map_err(command_error)
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut browser = self.browser.lock().await;

        debug!("Closing browser");
        browser.close().await.map_err(command_error)?;

        debug!("Waiting for browser process to exit");
        browser.wait().await.map_err(command_error)?;
        Ok(())
    }

    async fn kill(&self) {
        let mut browser = self.browser.lock().await;
        match browser.kill().await {
            Some(Err(e)) => warn!("Failed to kill browser process: {e}"),
            Some(Ok(())) => debug!("Browser process killed"),
            None => debug!("Browser process already gone"),
        }
        self.exited.cancel();
    }
}

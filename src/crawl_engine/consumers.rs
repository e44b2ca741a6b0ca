//! Event consumers: one task per protocol event category.
//!
//! Each consumer drains its own queue and applies events to the shared raw
//! result under the session lock. On cancellation a consumer closes its queue
//! and applies whatever is still buffered before exiting, so no identifier a
//! transport already delivered is lost.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::browser::{EventCategory, EventQueues, ProtocolEvent};
use crate::result::RawResult;

/// Apply one event to the raw result. Returns true for the first load event.
pub(crate) fn apply(event: ProtocolEvent, raw: &mut RawResult) -> bool {
    match event {
        ProtocolEvent::LoadEventFired { .. } => {
            let timing = &mut raw.summary.timing;
            // A load seen after the browser closed must not break timing order.
            if timing.load_event.is_none() && timing.browser_close.is_none() {
                timing.load_event = Some(Utc::now());
                return true;
            }
            false
        }
        ProtocolEvent::RequestWillBeSent(req) => {
            raw.requests
                .entry(req.request_id.clone())
                .or_default()
                .push(req);
            false
        }
        ProtocolEvent::ResponseReceived(resp) => {
            raw.responses
                .entry(resp.request_id.clone())
                .or_default()
                .push(resp);
            false
        }
        ProtocolEvent::ScriptParsed(script) => {
            raw.scripts.insert(script.script_id.clone(), script);
            false
        }
    }
}

async fn consume(
    category: EventCategory,
    mut rx: mpsc::Receiver<ProtocolEvent>,
    shared: Arc<Mutex<RawResult>>,
    cancel: CancellationToken,
    mut loaded: Option<oneshot::Sender<()>>,
) {
    let mut handle = |event: ProtocolEvent| {
        let first_load = apply(event, &mut shared.lock());
        if first_load && let Some(tx) = loaded.take() {
            let _ = tx.send(());
        }
    };

    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(event) => handle(event),
                None => {
                    log::trace!(target: "mida::events", "{} queue closed", category.name());
                    return;
                }
            },
            () = cancel.cancelled() => break,
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Ok(event) = rx.try_recv() {
        handle(event);
        drained += 1;
    }
    log::trace!(
        target: "mida::events",
        "{} consumer cancelled, drained {drained} buffered events",
        category.name()
    );
}

/// Start one consumer per queue.
///
/// `loaded` fires on the first load event.
pub(crate) fn spawn_consumers(
    queues: EventQueues,
    shared: &Arc<Mutex<RawResult>>,
    cancel: &CancellationToken,
    loaded: oneshot::Sender<()>,
) -> JoinSet<()> {
    let mut consumers = JoinSet::new();
    let mut loaded = Some(loaded);

    for (category, rx) in queues.into_parts() {
        let signal = if category == EventCategory::Load {
            loaded.take()
        } else {
            None
        };
        consumers.spawn(consume(
            category,
            rx,
            Arc::clone(shared),
            cancel.clone(),
            signal,
        ));
    }
    consumers
}

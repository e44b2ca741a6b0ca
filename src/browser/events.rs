//! Protocol events and their per-category queues.
//!
//! A transport pushes every event it observes through an `EventRouter`, which
//! routes it by category onto its own bounded FIFO queue. The session runs one
//! consumer per queue. There is no ordering across categories.

use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::result::{RequestRecord, ResponseRecord, ScriptRecord};

/// Tagged envelope for every protocol event a session consumes
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// The page fired its load event; protocol timestamp in seconds
    LoadEventFired { timestamp: f64 },
    RequestWillBeSent(RequestRecord),
    ResponseReceived(ResponseRecord),
    ScriptParsed(ScriptRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Load,
    Request,
    Response,
    Script,
}

impl EventCategory {
    pub const ALL: [Self; 4] = [Self::Load, Self::Request, Self::Response, Self::Script];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Request => "request",
            Self::Response => "response",
            Self::Script => "script",
        }
    }
}

impl ProtocolEvent {
    #[must_use]
    pub fn category(&self) -> EventCategory {
        match self {
            Self::LoadEventFired { .. } => EventCategory::Load,
            Self::RequestWillBeSent(_) => EventCategory::Request,
            Self::ResponseReceived(_) => EventCategory::Response,
            Self::ScriptParsed(_) => EventCategory::Script,
        }
    }
}

/// Sending half of the per-category queues, handed to the transport
#[derive(Debug, Clone)]
pub struct EventRouter {
    load: mpsc::Sender<ProtocolEvent>,
    request: mpsc::Sender<ProtocolEvent>,
    response: mpsc::Sender<ProtocolEvent>,
    script: mpsc::Sender<ProtocolEvent>,
}

/// Receiving half of the per-category queues, owned by the session's consumers
#[derive(Debug)]
pub struct EventQueues {
    pub load: mpsc::Receiver<ProtocolEvent>,
    pub request: mpsc::Receiver<ProtocolEvent>,
    pub response: mpsc::Receiver<ProtocolEvent>,
    pub script: mpsc::Receiver<ProtocolEvent>,
}

impl EventQueues {
    /// Split into `(category, receiver)` pairs, one per consumer
    #[must_use]
    pub fn into_parts(self) -> [(EventCategory, mpsc::Receiver<ProtocolEvent>); 4] {
        [
            (EventCategory::Load, self.load),
            (EventCategory::Request, self.request),
            (EventCategory::Response, self.response),
            (EventCategory::Script, self.script),
        ]
    }
}

/// Create the four queues, each holding up to `capacity` events
#[must_use]
pub fn event_channels(capacity: usize) -> (EventRouter, EventQueues) {
    let (load_tx, load_rx) = mpsc::channel(capacity);
    let (request_tx, request_rx) = mpsc::channel(capacity);
    let (response_tx, response_rx) = mpsc::channel(capacity);
    let (script_tx, script_rx) = mpsc::channel(capacity);

    (
        EventRouter {
            load: load_tx,
            request: request_tx,
            response: response_tx,
            script: script_tx,
        },
        EventQueues {
            load: load_rx,
            request: request_rx,
            response: response_rx,
            script: script_rx,
        },
    )
}

impl EventRouter {
    fn sender(&self, category: EventCategory) -> &mpsc::Sender<ProtocolEvent> {
        match category {
            EventCategory::Load => &self.load,
            EventCategory::Request => &self.request,
            EventCategory::Response => &self.response,
            EventCategory::Script => &self.script,
        }
    }

    /// Queue an event on its category's queue, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Closed` once the session stopped consuming.
    pub async fn deliver(&self, event: ProtocolEvent) -> Result<(), TransportError> {
        self.sender(event.category())
            .send(event)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// True once the session has dropped every queue
    #[must_use]
    pub fn is_closed(&self) -> bool {
        EventCategory::ALL
            .iter()
            .all(|c| self.sender(*c).is_closed())
    }
}

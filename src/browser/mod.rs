//! Browser transport: the traits a site visit drives, the protocol event
//! envelope, and the chromiumoxide-backed implementation.

pub mod chromium;
pub mod events;
pub mod transport;

pub use chromium::ChromiumTransport;
pub use events::{EventCategory, EventQueues, EventRouter, ProtocolEvent, event_channels};
pub use transport::{BrowserProcess, BrowserTransport, LaunchConfig, format_flag};

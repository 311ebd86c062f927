//! Digest engine: HTTP requests, event-stream subscriptions, and polling.
mod api;
mod backoff;
mod manager;
mod poller;
mod settings;
mod sse;
mod transport;
mod types;

pub use api::{DigestApi, ReqwestApi};
pub use backoff::{BackoffPolicy, Reconnect, ReconnectTracker};
pub use manager::{ChannelSignalSink, SignalSink, StreamManager, StreamSignal, CLOSE_EVENT};
pub use poller::{ListPoller, MIN_POLL_INTERVAL};
pub use settings::ClientSettings;
pub use sse::{SseEvent, SseParser, MAX_LINE_BYTES};
pub use transport::{parse_event_stream, EventStream, EventTransport, ReqwestTransport};
pub use types::{ApiError, FailureKind, TransportError};

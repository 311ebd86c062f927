use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Identifies one stream subscription opened on behalf of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Correlates a one-shot request effect with its result message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// Monotonic source for subscription and request ids within one session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct IdSeq {
    last: u64,
}

impl IdSeq {
    fn bump(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    pub(crate) fn subscription(&mut self) -> SubscriptionId {
        SubscriptionId(self.bump())
    }

    pub(crate) fn request(&mut self) -> RequestId {
        RequestId(self.bump())
    }
}

/// One lifecycle signal or payload from a stream subscription, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamInput {
    /// A (re)connect attempt is starting. `attempt` is 0 for the first open.
    Connecting { attempt: u32 },
    /// The transport accepted the subscription.
    Opened,
    /// A dispatched event. `event` is `None` for default (unnamed) messages.
    Message { event: Option<String>, data: String },
    /// The transport failed; a reconnect is scheduled after `retry_in`.
    TransportError { message: String, retry_in: Duration },
    /// The transport failed and no further automatic attempt will be made.
    GaveUp { message: String },
    /// The server ended the stream on purpose.
    ServerClosed,
}

impl StreamInput {
    pub fn message(event: Option<&str>, data: impl Into<String>) -> Self {
        StreamInput::Message {
            event: event.map(ToOwned::to_owned),
            data: data.into(),
        }
    }
}

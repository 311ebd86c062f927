//! Stream connection manager: one live subscription at a time, reconnected
//! with bounded exponential backoff.

use std::sync::Arc;

use digest_core::{StreamInput, SubscriptionId};
use digest_logging::{digest_debug, digest_info, digest_warn};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backoff::{BackoffPolicy, Reconnect, ReconnectTracker};
use crate::transport::EventTransport;
use crate::TransportError;

/// Name of the server event that ends a subscription on purpose.
pub const CLOSE_EVENT: &str = "close";

/// A stream input tagged with the subscription that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSignal {
    pub subscription: SubscriptionId,
    pub input: StreamInput,
}

pub trait SignalSink: Send + Sync {
    fn emit(&self, signal: StreamSignal);
}

impl<F> SignalSink for F
where
    F: Fn(StreamSignal) + Send + Sync,
{
    fn emit(&self, signal: StreamSignal) {
        self(signal)
    }
}

pub struct ChannelSignalSink {
    tx: mpsc::UnboundedSender<StreamSignal>,
}

impl ChannelSignalSink {
    pub fn new(tx: mpsc::UnboundedSender<StreamSignal>) -> Self {
        Self { tx }
    }
}

impl SignalSink for ChannelSignalSink {
    fn emit(&self, signal: StreamSignal) {
        let _ = self.tx.send(signal);
    }
}

struct ActiveStream {
    subscription: SubscriptionId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns at most one subscription. Connecting again, disconnecting, or
/// dropping the manager stops the previous driver before returning, so a
/// pending reconnect can never revive a superseded subscription.
pub struct StreamManager {
    transport: Arc<dyn EventTransport>,
    policy: BackoffPolicy,
    sink: Arc<dyn SignalSink>,
    active: Option<ActiveStream>,
}

impl StreamManager {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        policy: BackoffPolicy,
        sink: Arc<dyn SignalSink>,
    ) -> Self {
        Self {
            transport,
            policy,
            sink,
            active: None,
        }
    }

    pub fn active_subscription(&self) -> Option<SubscriptionId> {
        self.active.as_ref().map(|active| active.subscription)
    }

    /// Opens `url` for `subscription`, tearing down any existing one first.
    /// Must be called from within a tokio runtime.
    pub fn connect(&mut self, subscription: SubscriptionId, url: Url) {
        self.disconnect();
        digest_info!("Opening {} at {}", subscription, url);

        let cancel = CancellationToken::new();
        let driver = Driver {
            transport: self.transport.clone(),
            sink: self.sink.clone(),
            subscription,
            url,
            tracker: ReconnectTracker::new(self.policy),
        };
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = driver.run() => {}
            }
        });
        self.active = Some(ActiveStream {
            subscription,
            cancel,
            task,
        });
    }

    /// Closes the live subscription, if any. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            digest_debug!("Closing {}", active.subscription);
            active.cancel.cancel();
            active.task.abort();
        }
    }

    /// Closes the live subscription only if it is `subscription`.
    pub fn disconnect_subscription(&mut self, subscription: SubscriptionId) {
        if self.active_subscription() == Some(subscription) {
            self.disconnect();
        }
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

struct Driver {
    transport: Arc<dyn EventTransport>,
    sink: Arc<dyn SignalSink>,
    subscription: SubscriptionId,
    url: Url,
    tracker: ReconnectTracker,
}

enum Ending {
    ServerClosed,
    Failed(TransportError),
}

impl Driver {
    fn emit(&self, input: StreamInput) {
        self.sink.emit(StreamSignal {
            subscription: self.subscription,
            input,
        });
    }

    async fn run(mut self) {
        loop {
            self.emit(StreamInput::Connecting {
                attempt: self.tracker.attempts(),
            });
            let err = match self.transport.open(&self.url).await {
                Ok(events) => {
                    self.tracker.on_open();
                    self.emit(StreamInput::Opened);
                    match self.pump(events).await {
                        Ending::ServerClosed => {
                            digest_info!("{} closed by server", self.subscription);
                            self.emit(StreamInput::ServerClosed);
                            return;
                        }
                        Ending::Failed(err) => err,
                    }
                }
                Err(err) => err,
            };

            match self.tracker.on_failure() {
                Reconnect::After(delay) => {
                    digest_warn!(
                        "{} failed: {}; reconnect {} in {:?}",
                        self.subscription,
                        err,
                        self.tracker.attempts(),
                        delay
                    );
                    self.emit(StreamInput::TransportError {
                        message: err.to_string(),
                        retry_in: delay,
                    });
                    tokio::time::sleep(delay).await;
                }
                Reconnect::GiveUp => {
                    digest_warn!("{} failed: {}; giving up", self.subscription, err);
                    self.emit(StreamInput::GaveUp {
                        message: err.to_string(),
                    });
                    return;
                }
            }
        }
    }

    async fn pump(&self, mut events: crate::EventStream) -> Ending {
        loop {
            match events.next().await {
                Some(Ok(event)) if event.is_named(CLOSE_EVENT) => return Ending::ServerClosed,
                Some(Ok(event)) => self.emit(StreamInput::Message {
                    event: event.event,
                    data: event.data,
                }),
                Some(Err(err)) => return Ending::Failed(err),
                None => return Ending::Failed(TransportError::Ended),
            }
        }
    }
}

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use url::Url;

use crate::sse::{SseEvent, SseParser};
use crate::TransportError;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<SseEvent, TransportError>> + Send>>;

/// Opens one event-stream subscription. A returned stream that yields
/// `None` ended without an explicit close.
#[async_trait::async_trait]
pub trait EventTransport: Send + Sync {
    async fn open(&self, url: &Url) -> Result<EventStream, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        // No overall timeout: subscriptions are expected to stay open.
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl EventTransport for ReqwestTransport {
    async fn open(&self, url: &Url) -> Result<EventStream, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }

        let body = Box::pin(response.bytes_stream().map(|chunk: reqwest::Result<Bytes>| {
            chunk.map_err(|err| TransportError::Interrupted(err.to_string()))
        }));
        Ok(parse_event_stream(body))
    }
}

struct ParseState<S> {
    body: S,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
    done: bool,
}

/// Turns a byte stream into dispatched events.
pub fn parse_event_stream<S, B>(body: S) -> EventStream
where
    S: Stream<Item = Result<B, TransportError>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = ParseState {
        body,
        parser: SseParser::new(),
        pending: VecDeque::new(),
        done: false,
    };
    let events = futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => match state.parser.feed(chunk.as_ref()) {
                    Ok(events) => state.pending.extend(events),
                    Err(err) => {
                        state.done = true;
                        return Some((Err(err), state));
                    }
                },
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.parser.finish();
                    state.done = true;
                }
            }
        }
    });
    Box::pin(events)
}

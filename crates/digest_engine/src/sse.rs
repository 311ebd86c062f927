//! Incremental `text/event-stream` parser.
//!
//! Bytes arrive in arbitrary chunks; complete events are returned as soon as
//! their terminating blank line has been seen.

use crate::TransportError;

/// Longest accepted line. Job snapshots carry the whole transcript on one
/// `data:` line, so this is generous.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// One dispatched server-sent event. `event` is `None` for default messages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    pub fn is_named(&self, name: &str) -> bool {
        self.event.as_deref() == Some(name)
    }
}

#[derive(Debug)]
pub struct SseParser {
    max_line: usize,
    buffer: Vec<u8>,
    started: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            max_line,
            buffer: Vec::new(),
            started: false,
            event: None,
            data: String::new(),
            has_data: false,
            last_id: None,
        }
    }

    /// Feeds a chunk and returns every event completed by it. A line longer
    /// than the limit fails the stream.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, TransportError> {
        self.buffer.extend_from_slice(chunk);
        if !self.started && self.buffer.len() >= 3 {
            if self.buffer.starts_with(b"\xEF\xBB\xBF") {
                self.buffer.drain(..3);
            }
            self.started = true;
        }

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..]
            .iter()
            .position(|byte| *byte == b'\n' || *byte == b'\r')
        {
            let end = consumed + offset;
            if offset > self.max_line {
                return Err(TransportError::LineTooLong(self.max_line));
            }
            let terminator = if self.buffer[end] == b'\r' {
                match self.buffer.get(end + 1) {
                    Some(b'\n') => 2,
                    Some(_) => 1,
                    // Wait for the next chunk to tell `\r` from `\r\n`.
                    None => break,
                }
            } else {
                1
            };
            let line = String::from_utf8_lossy(&self.buffer[consumed..end]).into_owned();
            consumed = end + terminator;
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        if consumed > 0 {
            self.started = true;
        }
        self.buffer.drain(..consumed);
        if self.buffer.len() > self.max_line {
            return Err(TransportError::LineTooLong(self.max_line));
        }
        Ok(events)
    }

    /// Resets at end of stream. An event without its terminating blank line
    /// is discarded, so nothing is returned.
    pub fn finish(&mut self) {
        self.buffer.clear();
        self.event = None;
        self.data.clear();
        self.has_data = false;
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self
            .event
            .take()
            .filter(|name| !name.is_empty() && name != "message");
        if !self.has_data && event.is_none() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        self.has_data = false;
        Some(SseEvent {
            event,
            data,
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(event: &str, data: &str) -> SseEvent {
        SseEvent {
            event: Some(event.to_string()),
            data: data.to_string(),
            id: None,
        }
    }

    #[test]
    fn parses_default_and_named_events() {
        let mut parser = SseParser::new();
        let events = parser
            .feed(b"data: {\"status\":\"starting\"}\n\nevent: update\ndata: {\"type\":\"x\"}\n\n")
            .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, None);
        assert_eq!(events[0].data, "{\"status\":\"starting\"}");
        assert_eq!(events[1], named("update", "{\"type\":\"x\"}"));
    }

    #[test]
    fn events_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: tok").unwrap().is_empty());
        assert!(parser.feed(b"en\ndata: \"Hi").unwrap().is_empty());
        assert!(parser.feed(b"\"\r").unwrap().is_empty());
        let events = parser.feed(b"\n\r\n").unwrap();
        assert_eq!(events, vec![named("token", "\"Hi\"")]);
    }

    #[test]
    fn multi_line_data_joined_with_newline() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: a\ndata:b\n\n").unwrap();
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn comments_and_unknown_fields_ignored() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keep-alive\nretry: 10\n\ndata: x\nid: 7\n\n").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn named_event_without_data_is_dispatched() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: close\n\n").unwrap();
        assert_eq!(events, vec![named("close", "")]);
    }

    #[test]
    fn message_type_maps_to_default() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"event: message\ndata: m\n\n").unwrap();
        assert_eq!(events[0].event, None);
    }

    #[test]
    fn bom_is_skipped() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"\xEF\xBB\xBFdata: x\n\n").unwrap();
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn unterminated_event_is_discarded_on_finish() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: partial\n").unwrap().is_empty());
        parser.finish();
        assert!(parser.feed(b"\n").unwrap().is_empty());
    }

    #[test]
    fn overlong_line_fails_the_stream() {
        let mut parser = SseParser::with_max_line(8);
        assert_eq!(parser.feed(b"data: ok\n\n").unwrap().len(), 1);
        assert!(parser.feed(b"data: 01").unwrap().is_empty());
        assert_eq!(
            parser.feed(b"23456789").unwrap_err(),
            TransportError::LineTooLong(8)
        );

        let mut parser = SseParser::with_max_line(8);
        assert_eq!(
            parser.feed(b"data: 0123456789\n\n").unwrap_err(),
            TransportError::LineTooLong(8)
        );
    }
}

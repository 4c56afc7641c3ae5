//! Server-sent events transport
//!
//! SSE format consists of:
//! - `event: <type>` - event type line
//! - `data: <payload>` - data line (repeated lines are joined with `\n`)
//! - `id: <id>` - last event ID, echoed back as `Last-Event-ID` on reconnect
//! - `retry: <ms>` - ignored
//! - Lines starting with `:` - comments, used by servers as heartbeats
//! - Empty line - dispatches the event
//!
//! Lines may end in `\n` or `\r\n`.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tracing::debug;

use crate::config::Config;
use crate::error::{StreamError, StreamResult};

pub const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Event name used when the server omits the `event:` field
pub const DEFAULT_EVENT: &str = "message";

/// A dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Longest line the parser will buffer before giving up on the stream
pub const MAX_LINE_LEN: usize = 16 * 1024 * 1024;

/// Incremental SSE decoder fed with raw byte chunks
#[derive(Debug)]
pub struct SseParser {
    buffer: Vec<u8>,
    // Bytes of `buffer` already known to hold no newline
    scanned: usize,
    max_line_len: usize,
    seen_first_line: bool,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::with_max_line_len(MAX_LINE_LEN)
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line_len,
            seen_first_line: false,
            event: None,
            data: Vec::new(),
            id: None,
        }
    }

    /// Feed a chunk, returning every event completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> StreamResult<Vec<SseMessage>> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=self.scanned + offset).collect();
            self.scanned = 0;
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = String::from_utf8(line)
                .map_err(|e| StreamError::Malformed(format!("invalid UTF-8 in line: {}", e)))?;
            if let Some(message) = self.process_line(&line) {
                messages.push(message);
            }
        }
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line_len {
            let len = self.buffer.len();
            self.buffer.clear();
            self.scanned = 0;
            return Err(StreamError::Malformed(format!(
                "line exceeds {} bytes ({} buffered)",
                self.max_line_len, len
            )));
        }

        Ok(messages)
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        let line = if self.seen_first_line {
            line
        } else {
            self.seen_first_line = true;
            line.strip_prefix('\u{feff}').unwrap_or(line)
        };

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

        // `retry` is ignored; the reconnect delay comes from configuration
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseMessage {
            event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id: self.id.clone(),
        })
    }
}

/// An open event stream
pub struct EventStream {
    chunks: BoxStream<'static, StreamResult<Vec<u8>>>,
    parser: SseParser,
    pending: VecDeque<SseMessage>,
    read_timeout: Duration,
}

impl EventStream {
    /// Open the stream described by `config`
    ///
    /// Non-2xx responses are returned as [`StreamError::Http`] so the caller
    /// can tell client errors from transient ones. `last_event_id` is sent as
    /// `Last-Event-ID` when resuming.
    pub async fn connect(
        client: &reqwest::Client,
        config: &Config,
        last_event_id: Option<&str>,
    ) -> StreamResult<Self> {
        debug!("Connecting to {}", config.stream_uri);
        let mut request = client
            .get(&config.stream_uri)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id {
            debug!(last_event_id = id, "Resuming stream");
            request = request.header(LAST_EVENT_ID, id);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("text/event-stream") {
            return Err(StreamError::UnexpectedContentType(content_type));
        }

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(StreamError::from));
        Ok(Self::from_chunks(chunks, config.read_timeout()))
    }

    /// Wrap an arbitrary chunk source
    pub fn from_chunks<S>(chunks: S, read_timeout: Duration) -> Self
    where
        S: futures_util::Stream<Item = StreamResult<Vec<u8>>> + Send + 'static,
    {
        Self {
            chunks: chunks.boxed(),
            parser: SseParser::new(),
            pending: VecDeque::new(),
            read_timeout,
        }
    }

    /// Wait for the next event
    ///
    /// Ends with [`StreamError::Closed`] when the server closes the stream and
    /// [`StreamError::ReadTimeout`] when it goes silent.
    pub async fn next_message(&mut self) -> StreamResult<SseMessage> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }

            let chunk = tokio::time::timeout(self.read_timeout, self.chunks.next())
                .await
                .map_err(|_| StreamError::ReadTimeout(self.read_timeout))?;

            match chunk {
                Some(Ok(bytes)) => self.pending.extend(self.parser.feed(&bytes)?),
                Some(Err(e)) => return Err(e),
                None => return Err(StreamError::Closed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &str) -> Vec<SseMessage> {
        SseParser::new().feed(input.as_bytes()).unwrap()
    }

    #[test]
    fn test_single_event() {
        let messages = parse_all("event: put\ndata: {\"a\":1}\n\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].event, "put");
        assert_eq!(messages[0].data, "{\"a\":1}");
    }

    #[test]
    fn test_multiline_data() {
        let messages = parse_all("event: put\ndata: {\ndata: }\n\n");
        assert_eq!(messages[0].data, "{\n}");
    }

    #[test]
    fn test_crlf_line_endings() {
        let messages = parse_all("event: delete\r\ndata: x\r\n\r\n");
        assert_eq!(messages[0].event, "delete");
        assert_eq!(messages[0].data, "x");
    }

    #[test]
    fn test_comments_are_ignored() {
        let messages = parse_all(":heartbeat\n\n:another\n");
        assert!(messages.is_empty());
    }

    #[test]
    fn test_event_without_data_is_dispatched() {
        let messages = parse_all("event: indirect/put\n\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].event, "indirect/put");
        assert_eq!(messages[0].data, "");
    }

    #[test]
    fn test_missing_event_name_defaults() {
        let messages = parse_all("data: hello\n\n");
        assert_eq!(messages[0].event, DEFAULT_EVENT);
    }

    #[test]
    fn test_value_without_space() {
        let messages = parse_all("event:patch\ndata:x\n\n");
        assert_eq!(messages[0].event, "patch");
        assert_eq!(messages[0].data, "x");
    }

    #[test]
    fn test_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: pa").unwrap().is_empty());
        assert!(parser.feed(b"tch\ndata: {}\r").unwrap().is_empty());
        let messages = parser.feed(b"\n\n").unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].event, "patch");
        assert_eq!(messages[0].data, "{}");
    }

    #[test]
    fn test_id_persists_and_retry_is_ignored() {
        let mut parser = SseParser::new();
        let messages = parser
            .feed(b"id: 42\nretry: 3000\nevent: put\ndata: {}\n\nevent: patch\ndata: {}\n\n")
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id.as_deref(), Some("42"));
        assert_eq!(messages[1].id.as_deref(), Some("42"));
    }

    #[test]
    fn test_leading_bom_is_stripped() {
        let messages = parse_all("\u{feff}event: put\ndata: {}\n\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].event, "put");
    }

    #[test]
    fn test_bom_only_stripped_from_first_line() {
        let messages = parse_all("event: put\ndata: \u{feff}x\n\n");
        assert_eq!(messages[0].data, "\u{feff}x");
    }

    #[test]
    fn test_long_line_across_many_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: put\ndata: ").unwrap().is_empty());
        for _ in 0..1000 {
            assert!(parser.feed(&[b'x'; 64]).unwrap().is_empty());
        }
        let messages = parser.feed(b"\n\n").unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data.len(), 64_000);
    }

    #[test]
    fn test_oversized_line_is_malformed() {
        let mut parser = SseParser::with_max_line_len(16);
        assert!(parser.feed(b"data: 0123456").unwrap().is_empty());

        let err = parser.feed(b"789abcdef").unwrap_err();
        assert!(matches!(err, StreamError::Malformed(_)));

        // Lines that fit are still fine
        let mut parser = SseParser::with_max_line_len(16);
        let messages = parser.feed(b"data: short\n\n").unwrap();
        assert_eq!(messages[0].data, "short");
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let err = SseParser::new().feed(b"data: \xff\xfe\n").unwrap_err();
        assert!(matches!(err, StreamError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_event_stream_yields_then_closes() {
        let chunks = futures_util::stream::iter(vec![
            Ok::<_, StreamError>(b"event: put\ndata: {}\n\nevent: patch\n".to_vec()),
            Ok(b"data: {}\n\n".to_vec()),
        ]);
        let mut stream = EventStream::from_chunks(chunks, Duration::from_secs(1));

        assert_eq!(stream.next_message().await.unwrap().event, "put");
        assert_eq!(stream.next_message().await.unwrap().event, "patch");
        assert!(matches!(
            stream.next_message().await,
            Err(StreamError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_event_stream_read_timeout() {
        let chunks = futures_util::stream::pending::<StreamResult<Vec<u8>>>();
        let mut stream = EventStream::from_chunks(chunks, Duration::from_millis(20));

        assert!(matches!(
            stream.next_message().await,
            Err(StreamError::ReadTimeout(_))
        ));
    }
}

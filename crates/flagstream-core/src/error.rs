//! Error types for streaming and fallback requests
//!
//! Errors are classified by how the stream loop must react to them:
//! terminal errors stop it for good, event-level errors drop a single event,
//! and everything else is retried after the reconnect delay.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the fallback flag requester
#[derive(Error, Debug)]
pub enum FetchError {
    /// The requested flag does not exist on the server
    #[error("Flag '{key}' not found")]
    NotFound { key: String },

    /// Server answered with a non-success status
    #[error("Flag request failed with HTTP status {status}")]
    Http { status: u16 },

    /// Network or decoding failure
    #[error("Flag request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors raised while connecting to or consuming the event stream
#[derive(Error, Debug)]
pub enum StreamError {
    /// Server rejected the stream request
    #[error("Stream request failed with HTTP status {status}")]
    Http { status: u16 },

    /// SDK key can't be sent as a header
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Network failure while connecting or reading
    #[error("Stream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response was not an event stream
    #[error("Unexpected content type '{0}', expected text/event-stream")]
    UnexpectedContentType(String),

    /// Server ended the stream
    #[error("Stream closed by server")]
    Closed,

    /// Nothing (not even a heartbeat) arrived in time
    #[error("No data received for {0:?}")]
    ReadTimeout(Duration),

    /// Stream framing could not be decoded
    #[error("Malformed stream: {0}")]
    Malformed(String),

    /// An event payload could not be parsed
    #[error("Invalid '{event}' payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// An item path did not carry the expected prefix
    #[error("Invalid item path '{0}'")]
    InvalidPath(String),

    /// Fallback request for a reference event failed
    #[error("Fallback request failed: {0}")]
    Fetch(#[from] FetchError),
}

impl StreamError {
    /// Client errors mean our request is wrong; retrying won't help
    pub fn is_terminal(&self) -> bool {
        match self {
            StreamError::Http { status } => (400..500).contains(status),
            StreamError::InvalidHeader(_) => true,
            _ => false,
        }
    }

    /// Errors confined to a single event; the connection stays usable
    pub fn is_event_level(&self) -> bool {
        matches!(
            self,
            StreamError::Payload { .. } | StreamError::InvalidPath(_)
        )
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            StreamError::Http { status } => Some(*status),
            StreamError::Fetch(FetchError::Http { status }) => Some(*status),
            StreamError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

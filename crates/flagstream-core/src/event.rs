//! Stream event decoding
//!
//! Event names are matched once here; everything downstream works with
//! [`StreamEvent`].

use serde::Deserialize;

use crate::error::{StreamError, StreamResult};
use crate::models::{AllFlags, FeatureFlag};
use crate::sse::SseMessage;

/// Prefix carried by item paths in patch and delete payloads
pub const PATH_PREFIX: char = '/';

pub const PUT: &str = "put";
pub const PATCH: &str = "patch";
pub const INDIRECT_PATCH: &str = "indirect/patch";
pub const INDIRECT_PUT: &str = "indirect/put";
pub const DELETE: &str = "delete";

/// A decoded push event
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Replace the whole dataset
    Put { flags: AllFlags },
    /// Insert or update one flag
    Patch { key: String, flag: FeatureFlag },
    /// One flag changed; fetch it
    IndirectPatch { key: String },
    /// The dataset changed; fetch all of it
    IndirectPut,
    /// Tombstone one flag
    Delete { key: String, version: u64 },
    /// Anything else
    Unrecognized { event: String },
}

#[derive(Deserialize)]
struct PatchPayload {
    path: String,
    data: FeatureFlag,
}

#[derive(Deserialize)]
struct DeletePayload {
    path: String,
    version: u64,
}

impl StreamEvent {
    /// Decode an SSE message into a typed event
    pub fn decode(message: &SseMessage) -> StreamResult<Self> {
        let event = match message.event.as_str() {
            PUT => StreamEvent::Put {
                flags: parse_json(PUT, &message.data)?,
            },
            PATCH => {
                let payload: PatchPayload = parse_json(PATCH, &message.data)?;
                StreamEvent::Patch {
                    key: key_from_path(&payload.path)?.to_string(),
                    flag: payload.data,
                }
            }
            INDIRECT_PATCH => {
                let key = message.data.trim();
                if key.is_empty() {
                    return Err(StreamError::InvalidPath(message.data.clone()));
                }
                StreamEvent::IndirectPatch {
                    key: key.to_string(),
                }
            }
            INDIRECT_PUT => StreamEvent::IndirectPut,
            DELETE => {
                let payload: DeletePayload = parse_json(DELETE, &message.data)?;
                StreamEvent::Delete {
                    key: key_from_path(&payload.path)?.to_string(),
                    version: payload.version,
                }
            }
            other => StreamEvent::Unrecognized {
                event: other.to_string(),
            },
        };
        Ok(event)
    }

    /// Wire name of the event
    pub fn name(&self) -> &str {
        match self {
            StreamEvent::Put { .. } => PUT,
            StreamEvent::Patch { .. } => PATCH,
            StreamEvent::IndirectPatch { .. } => INDIRECT_PATCH,
            StreamEvent::IndirectPut => INDIRECT_PUT,
            StreamEvent::Delete { .. } => DELETE,
            StreamEvent::Unrecognized { event } => event.as_str(),
        }
    }
}

/// Strip the path prefix to get the item key
pub fn key_from_path(path: &str) -> StreamResult<&str> {
    match path.strip_prefix(PATH_PREFIX) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(StreamError::InvalidPath(path.to_string())),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(event: &'static str, data: &str) -> StreamResult<T> {
    serde_json::from_str(data).map_err(|source| StreamError::Payload { event, source })
}

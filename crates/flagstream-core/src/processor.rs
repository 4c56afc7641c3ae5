//! Event processing
//!
//! Applies one stream event to the store, fetching referenced data first
//! when the event only names it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StreamResult;
use crate::event::StreamEvent;
use crate::requester::FeatureRequester;
use crate::sse::SseMessage;
use crate::store::FeatureStore;

/// Maps stream events onto store mutations
pub struct EventProcessor {
    store: Arc<dyn FeatureStore>,
    requester: Arc<dyn FeatureRequester>,
}

impl EventProcessor {
    pub fn new(store: Arc<dyn FeatureStore>, requester: Arc<dyn FeatureRequester>) -> Self {
        Self { store, requester }
    }

    /// Decode and apply a raw stream message
    ///
    /// Returns `Ok(true)` when the message left the store holding a full
    /// dataset. Malformed payloads are logged and dropped; only failures of
    /// the fallback requester are returned as errors.
    pub async fn process(&self, message: &SseMessage) -> StreamResult<bool> {
        debug!(event = %message.event, data = %message.data, "Received stream event");

        match StreamEvent::decode(message) {
            Ok(event) => self.apply(event).await,
            Err(e) if e.is_event_level() => {
                warn!("Dropping '{}' event: {}", message.event, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Apply an already decoded event
    pub async fn apply(&self, event: StreamEvent) -> StreamResult<bool> {
        debug!(event = event.name(), "Applying stream event");
        match event {
            StreamEvent::Put { flags } => {
                debug!(count = flags.len(), "Replacing all flags");
                self.store.init(flags);
                Ok(self.store.initialized())
            }
            StreamEvent::Patch { key, flag } => {
                debug!(key = %key, version = flag.version, "Patching flag");
                self.store.upsert(&key, flag);
                Ok(false)
            }
            StreamEvent::IndirectPatch { key } => {
                let flag = self.requester.get_one(&key).await?;
                debug!(key = %key, version = flag.version, "Patching fetched flag");
                self.store.upsert(&key, flag);
                Ok(false)
            }
            StreamEvent::IndirectPut => {
                let flags = self.requester.get_all().await?;
                debug!(count = flags.len(), "Replacing all flags with fetched set");
                self.store.init(flags);
                Ok(self.store.initialized())
            }
            StreamEvent::Delete { key, version } => {
                debug!(key = %key, version, "Deleting flag");
                self.store.delete(&key, version);
                Ok(false)
            }
            StreamEvent::Unrecognized { event } => {
                warn!("Unhandled event in stream processor: {}", event);
                Ok(false)
            }
        }
    }
}

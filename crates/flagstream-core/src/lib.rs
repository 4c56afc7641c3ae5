//! flagstream core library
//!
//! Keeps a local replica of a remote feature-flag dataset up to date by
//! consuming a server-sent events stream.
//!
//! # Architecture
//!
//! - **StreamProcessor**: background reconnect loop, owns the connection
//! - **EventProcessor**: applies each event to the store
//! - **FeatureStore**: versioned in-memory replica, safe for concurrent reads
//! - **FeatureRequester**: fallback HTTP fetches for reference events
//! - **ReadinessGate**: one-shot "first full dataset received" signal
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = Arc::new(InMemoryFeatureStore::new());
//! let requester = Arc::new(HttpFeatureRequester::new(config.clone())?);
//! let processor = StreamProcessor::new(config, store.clone(), requester)?;
//!
//! processor.start();
//! if processor.wait_ready(Duration::from_secs(5)).await && processor.initialized() {
//!     let flag = store.get("new-checkout");
//! }
//! ```
//!
//! # Modules
//!
//! - `stream`: connection lifecycle (main entry point)
//! - `processor`: per-event update protocol
//! - `event`: typed stream events
//! - `sse`: server-sent events decoding
//! - `store`: feature store contract and in-memory implementation
//! - `requester`: fallback flag requests
//! - `readiness`: readiness gate
//! - `config`: client configuration

pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod models;
pub mod processor;
pub mod readiness;
pub mod requester;
pub mod sse;
pub mod store;
pub mod stream;

pub use config::Config;
pub use error::{FetchError, StreamError, StreamResult};
pub use event::StreamEvent;
pub use models::{AllFlags, FeatureFlag};
pub use processor::EventProcessor;
pub use readiness::ReadinessGate;
pub use requester::{FeatureRequester, HttpFeatureRequester};
pub use sse::{EventStream, SseMessage, SseParser};
pub use store::{FeatureStore, InMemoryFeatureStore};
pub use stream::{ConnectionState, StreamProcessor, UpdateProcessor};

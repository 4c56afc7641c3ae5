//! Streaming update processor
//!
//! Maintains a long-lived server-sent events connection and keeps the store
//! in sync with it. Reconnects after transient failures with a fixed delay;
//! gives up for good on client errors (4xx).
//!
//! ## Usage
//!
//! ```ignore
//! let store = Arc::new(InMemoryFeatureStore::new());
//! let requester = Arc::new(HttpFeatureRequester::new(config.clone())?);
//! let processor = StreamProcessor::new(config, store, requester)?;
//!
//! processor.start();
//! processor.wait_ready(Duration::from_secs(5)).await;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::error::{StreamError, StreamResult};
use crate::http;
use crate::processor::EventProcessor;
use crate::readiness::ReadinessGate;
use crate::requester::FeatureRequester;
use crate::sse::EventStream;
use crate::store::FeatureStore;

/// Lifecycle state of the reconnect loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not running; once stopped, never restarted
    Stopped,
    /// Connected, connecting, or waiting to reconnect
    Running,
}

/// Interface the rest of the client uses to drive an update source
pub trait UpdateProcessor: Send + Sync {
    /// Begin receiving updates in the background
    fn start(&self);

    /// Request termination
    fn stop(&self);

    /// Whether the local data is usable
    fn initialized(&self) -> bool;
}

/// State shared between the handle and the background task
struct Inner {
    config: Config,
    client: reqwest::Client,
    events: EventProcessor,
    store: Arc<dyn FeatureStore>,
    ready: ReadinessGate,
    state: watch::Sender<ConnectionState>,
    last_event_id: Mutex<Option<String>>,
}

/// Update processor backed by the push-event stream
pub struct StreamProcessor {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl StreamProcessor {
    /// Create a processor; nothing connects until [`start`](UpdateProcessor::start)
    pub fn new(
        config: Config,
        store: Arc<dyn FeatureStore>,
        requester: Arc<dyn FeatureRequester>,
    ) -> StreamResult<Self> {
        let client = http::build_client(&config, None)?;
        let (state, _) = watch::channel(ConnectionState::Stopped);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                client,
                events: EventProcessor::new(store.clone(), requester),
                store,
                ready: ReadinessGate::new(),
                state,
                last_event_id: Mutex::new(None),
            }),
            task: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Whether the readiness gate has been released
    ///
    /// The gate is also released when the stream gives up, so this alone
    /// does not mean data is available; see [`initialized`](UpdateProcessor::initialized).
    pub fn is_ready(&self) -> bool {
        self.inner.ready.is_set()
    }

    /// Wait until the readiness gate is released or `timeout` elapses
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        self.inner.ready.wait_timeout(timeout).await
    }

    /// Wait for the background task to finish
    ///
    /// Returns immediately if the processor was never started.
    pub async fn join(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Stream task failed: {}", e);
            }
        }
    }
}

impl UpdateProcessor for StreamProcessor {
    /// Spawn the reconnect loop on the current tokio runtime
    ///
    /// Only the first call has an effect, and a processor that was stopped
    /// before starting stays stopped.
    fn start(&self) {
        // The task slot doubles as the lifecycle lock so start and stop can't interleave.
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("Stream processor already started");
            return;
        }

        self.inner.state.send_replace(ConnectionState::Running);

        let session = format!("stream-{}", &uuid::Uuid::new_v4().to_string()[..8]);
        let span = info_span!("stream", session = %session);
        *task = Some(tokio::spawn(run(self.inner.clone()).instrument(span)));
    }

    fn stop(&self) {
        let _task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        self.started.store(true, Ordering::Release);
        let previous = self.inner.state.send_replace(ConnectionState::Stopped);
        if previous == ConnectionState::Running {
            info!("Stopping stream processor");
        }
    }

    fn initialized(&self) -> bool {
        self.inner.is_running() && self.inner.ready.is_set() && self.inner.store.initialized()
    }
}

impl Drop for StreamProcessor {
    fn drop(&mut self) {
        self.inner.state.send_replace(ConnectionState::Stopped);
    }
}

impl Inner {
    fn is_running(&self) -> bool {
        *self.state.borrow() == ConnectionState::Running
    }

    /// Connect once and consume events until the connection fails
    ///
    /// Returns `Ok(())` only when a stop request is seen between events.
    async fn consume(&self) -> StreamResult<()> {
        let resume_from = self.last_event_id();
        let mut stream =
            EventStream::connect(&self.client, &self.config, resume_from.as_deref()).await?;
        info!("Connected to stream at {}", self.config.stream_uri);

        loop {
            if !self.is_running() {
                return Ok(());
            }

            let message = stream.next_message().await?;
            if !self.is_running() {
                return Ok(());
            }
            if let Some(id) = &message.id {
                *self.lock_last_event_id() = Some(id.clone());
            }

            if self.events.process(&message).await? && self.ready.set() {
                info!("Stream processor initialized ok");
            }
        }
    }

    fn last_event_id(&self) -> Option<String> {
        self.lock_last_event_id().clone()
    }

    fn lock_last_event_id(&self) -> MutexGuard<'_, Option<String>> {
        self.last_event_id.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Give up for good and release anyone waiting for readiness
    fn give_up(&self, err: &StreamError) {
        error!(
            status = ?err.status(),
            "Stream response: {}. Retries will not be attempted.", err
        );
        self.ready.set();
        self.state.send_replace(ConnectionState::Stopped);
    }
}

/// Resolves once the state becomes `Stopped`
async fn stopped(state: &mut watch::Receiver<ConnectionState>) {
    // An error means the sender is gone, which also means stopped.
    let _ = state.wait_for(|s| *s == ConnectionState::Stopped).await;
}

/// Main loop with reconnection
async fn run(inner: Arc<Inner>) {
    info!(
        "Starting stream processor connecting to {}",
        inner.config.stream_uri
    );
    let mut state = inner.state.subscribe();
    let delay = inner.config.reconnect_delay();

    while inner.is_running() {
        let result = tokio::select! {
            _ = stopped(&mut state) => break,
            result = inner.consume() => result,
        };

        match result {
            Ok(()) => continue,
            Err(e) if e.is_terminal() => {
                inner.give_up(&e);
                break;
            }
            Err(e) => {
                warn!(
                    "Could not maintain stream connection: {}. Waiting {:?} before trying again.",
                    e, delay
                );
            }
        }

        tokio::select! {
            _ = stopped(&mut state) => break,
            _ = tokio::time::sleep(delay) => debug!("Reconnecting"),
        }
    }

    info!("Stream processor stopped");
}

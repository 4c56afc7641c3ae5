//! Stream command handlers

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::info;

use flagstream_core::{
    Config, ConnectionState, FeatureStore, HttpFeatureRequester, InMemoryFeatureStore,
    StreamProcessor, UpdateProcessor,
};

use crate::output::Output;

/// Build a processor and store from configuration
fn open(config: &Config) -> Result<(Arc<InMemoryFeatureStore>, StreamProcessor)> {
    if config.sdk_key.is_none() {
        bail!(
            "SDK key not configured. Set it with:\n  \
             flagstream config set sdk_key <key>\n  \
             or export FLAGSTREAM_SDK_KEY"
        );
    }

    let store = Arc::new(InMemoryFeatureStore::new());
    let requester = Arc::new(
        HttpFeatureRequester::new(config.clone()).context("Failed to create flag requester")?,
    );
    let processor = StreamProcessor::new(config.clone(), store.clone(), requester)
        .context("Failed to create stream processor")?;
    Ok((store, processor))
}

/// Stream until interrupted, logging state changes
pub async fn watch(config: &Config, output: &Output) -> Result<()> {
    let (store, processor) = open(config)?;
    let mut state = processor.subscribe_state();

    output.message(&format!("Streaming from {} (Ctrl-C to stop)", config.stream_uri));
    processor.start();

    let mut reported_ready = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                processor.stop();
                break;
            }
            ready = processor.wait_ready(Duration::from_secs(3600)), if !reported_ready => {
                reported_ready = ready;
                if ready && processor.initialized() {
                    output.success(&format!("Initialized with {} flags", store.all().len()));
                }
            }
            changed = state.changed() => {
                if changed.is_err() || *state.borrow() == ConnectionState::Stopped {
                    break;
                }
            }
        }
    }

    processor.join().await;
    info!("Watch finished");

    if !store.initialized() {
        bail!("Stream stopped before any flags were received");
    }
    Ok(())
}

/// Wait for the first full dataset and print it
pub async fn dump(config: &Config, timeout: Duration, output: &Output) -> Result<()> {
    let (store, processor) = open(config)?;

    output.message(&format!("Connecting to {}...", config.stream_uri));
    processor.start();

    let ready = processor.wait_ready(timeout).await;
    let initialized = processor.initialized();
    processor.stop();
    processor.join().await;

    if !ready {
        bail!("Timed out after {:?} waiting for flags", timeout);
    }
    if !initialized {
        bail!("Stream stopped before any flags were received (check the SDK key)");
    }

    output.print_flags(&store.all());
    Ok(())
}

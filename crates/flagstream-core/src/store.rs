//! Feature store
//!
//! The stream writes to the store from a single task while any number of
//! other threads read from it. Individual item writes are version-gated so
//! that duplicate or out-of-order deliveries after a reconnect are harmless;
//! a full `init` replaces everything unconditionally.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::models::{AllFlags, FeatureFlag};

/// Storage contract consumed by the stream processor
pub trait FeatureStore: Send + Sync {
    /// Replace the whole dataset and mark the store initialized
    ///
    /// Each flag takes its key from the map entry it is stored under.
    fn init(&self, flags: AllFlags);

    /// Insert or replace `key` if `flag.version` is strictly newer
    fn upsert(&self, key: &str, flag: FeatureFlag);

    /// Tombstone `key` if `version` is strictly newer
    fn delete(&self, key: &str, version: u64);

    /// Whether a full dataset has ever been loaded
    fn initialized(&self) -> bool;

    /// Get a live flag (tombstones are hidden)
    fn get(&self, key: &str) -> Option<FeatureFlag>;

    /// All live flags
    fn all(&self) -> AllFlags;
}

/// In-memory store guarded by a reader/writer lock
#[derive(Debug, Default)]
pub struct InMemoryFeatureStore {
    flags: RwLock<HashMap<String, FeatureFlag>>,
    initialized: AtomicBool,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version currently stored for `key`, tombstones included
    pub fn version_of(&self, key: &str) -> Option<u64> {
        self.read().get(key).map(|f| f.version)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, FeatureFlag>> {
        self.flags.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, FeatureFlag>> {
        self.flags.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Write `flag` under `key` unless the stored version is the same or newer
    fn put_if_newer(&self, key: &str, flag: FeatureFlag) -> bool {
        let mut flags = self.write();
        match flags.get(key) {
            Some(existing) if existing.version >= flag.version => {
                debug!(
                    key,
                    stored = existing.version,
                    incoming = flag.version,
                    "Ignoring stale write"
                );
                false
            }
            _ => {
                flags.insert(key.to_string(), flag);
                true
            }
        }
    }
}

impl FeatureStore for InMemoryFeatureStore {
    fn init(&self, mut flags: AllFlags) {
        for (key, flag) in flags.iter_mut() {
            flag.key.clone_from(key);
        }

        let mut current = self.write();
        *current = flags;
        self.initialized.store(true, Ordering::Release);
        debug!(count = current.len(), "Store initialized");
    }

    fn upsert(&self, key: &str, mut flag: FeatureFlag) {
        // The path key is authoritative over whatever the payload claims
        flag.key = key.to_string();
        self.put_if_newer(key, flag);
    }

    fn delete(&self, key: &str, version: u64) {
        self.put_if_newer(key, FeatureFlag::tombstone(key, version));
    }

    fn initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn get(&self, key: &str) -> Option<FeatureFlag> {
        self.read().get(key).filter(|f| !f.deleted).cloned()
    }

    fn all(&self) -> AllFlags {
        self.read()
            .iter()
            .filter(|(_, f)| !f.deleted)
            .map(|(k, f)| (k.clone(), f.clone()))
            .collect()
    }
}

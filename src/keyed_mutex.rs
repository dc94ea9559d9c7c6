// src/keyed_mutex.rs
// Per-user serialization (spec §4.4, §5): profile updates and tier
// migration for a given user must not interleave, but different users must
// not block each other. A map of per-key async mutexes behind a
// parking_lot::RwLock, following AppState's upload_sessions idiom
// (backend/src/state.rs) for keyed concurrent state.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyedMutex {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        if let Some(existing) = self.locks.read().get(key) {
            return existing.clone();
        }
        self.locks
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquires the lock for `key`, blocking other callers with the same
    /// key until the returned guard is dropped. Callers with different keys
    /// proceed concurrently.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self.lock_for(key);
        mutex.lock_owned().await
    }
}

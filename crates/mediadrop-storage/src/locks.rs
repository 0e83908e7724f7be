//! Per-session lock registry
//!
//! Maps an upload session to its own async mutex. The registry map is guarded
//! by a short-lived std mutex used only for lookup and insertion; the session
//! mutex is what callers hold across the completeness check and merge, so
//! unrelated sessions never wait on each other.

use mediadrop_core::SessionKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Guard held while a session is checked for completeness and merged.
pub type SessionGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<SessionKey, Arc<AsyncMutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the lock for `key`, creating it on first reference.
    ///
    /// Every caller asking for the same key gets the same instance until the
    /// entry is removed.
    pub fn lock_for(&self, key: &SessionKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to the session.
    pub async fn acquire(&self, key: &SessionKey) -> SessionGuard {
        self.lock_for(key).lock_owned().await
    }

    /// Evict the entry for `key` if nobody else references it.
    ///
    /// Call after dropping the guard. Holders and waiters keep their own clone
    /// of the lock, so an entry with other references stays; the last caller
    /// to release it removes it. Clones are only handed out under the map
    /// mutex, so a new caller can never end up on an evicted lock.
    pub fn release(&self, key: &SessionKey) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

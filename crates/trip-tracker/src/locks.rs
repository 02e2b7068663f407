//! Per-key async locks serializing read-modify-write cycles on one trip.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per key. Keys are created on first use and
/// dropped once no guard or waiter holds them, so the map only ever contains
/// trips with work in flight.
#[derive(Debug, Clone, Default)]
pub struct KeyLocker {
    inner: Arc<KeyLockerInner>,
}

impl KeyLocker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: impl Into<String>) -> KeyLockGuard {
        let key = key.into();
        let lock =
            self.inner.locks.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        let guard = lock.lock_owned().await;
        KeyLockGuard { key, inner: Arc::clone(&self.inner), guard: Some(guard) }
    }

    /// Number of keys currently locked or awaited.
    #[must_use]
    pub fn active(&self) -> usize {
        self.inner.locks.len()
    }
}

#[derive(Debug, Default)]
struct KeyLockerInner {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

#[derive(Debug)]
pub struct KeyLockGuard {
    key: String,
    inner: Arc<KeyLockerInner>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyLockGuard {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        // release the mutex first so its Arc no longer counts towards waiters
        self.guard.take();
        self.inner.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

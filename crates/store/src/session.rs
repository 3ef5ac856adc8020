//! In-memory upload sessions keyed by fingerprint.
//!
//! The filesystem remains the source of truth for resume probes (the
//! chunk directory listing); the registry exists to hand out the
//! per-fingerprint lock that serializes the final merge against
//! concurrent chunk writes, and to track what this process has received.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, MutexGuard};

/// Mutable per-fingerprint state, reachable only through the lock.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Indices acknowledged by this process (a subset of what is on disk
    /// after a restart).
    pub received: BTreeSet<u32>,
    /// Set once a merge for this fingerprint completed.
    pub merged: bool,
}

/// One upload session. The inner mutex is the fingerprint's lock.
#[derive(Debug, Default)]
pub struct UploadSession {
    state: Mutex<SessionState>,
}

impl UploadSession {
    /// Takes the fingerprint lock.
    ///
    /// Chunk writes hold this across their put; merge holds it for its
    /// full duration, so a merge never observes a half-staged write and a
    /// write never lands in a directory merge is consuming.
    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }
}

/// Registry of live sessions, keyed by fingerprint.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<StdMutex<HashMap<String, Arc<UploadSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `fingerprint`, creating it on first use.
    pub fn session(&self, fingerprint: &str) -> Arc<UploadSession> {
        let mut map = self.inner.lock().expect("session registry poisoned");
        Arc::clone(map.entry(fingerprint.to_string()).or_default())
    }

    /// Drops the session after a completed merge.
    pub fn remove(&self, fingerprint: &str) {
        let mut map = self.inner.lock().expect("session registry poisoned");
        map.remove(fingerprint);
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("session registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

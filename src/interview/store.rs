//! Flow-state storage and per-session turn serialization.
//!
//! The controller never owns session state directly: it loads, mutates, and
//! saves through a `FlowStateStore`. `InMemoryFlowStore` lives as long as the
//! process; `LibSqlBackend` also implements the trait for durable state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::DatabaseError;

use super::state::{SessionFlowState, SessionKey};

/// Backend-agnostic flow-state storage.
#[async_trait]
pub trait FlowStateStore: Send + Sync {
    /// Fetch the state for `key`, if any.
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionFlowState>, DatabaseError>;

    /// Insert or replace the state for `key`.
    async fn save(&self, key: &SessionKey, state: &SessionFlowState) -> Result<(), DatabaseError>;

    /// Drop the state for `key`. Returns whether anything was removed.
    async fn remove(&self, key: &SessionKey) -> Result<bool, DatabaseError>;

    /// All keys currently held.
    async fn list_keys(&self) -> Result<Vec<SessionKey>, DatabaseError>;
}

/// Process-lifetime flow store. Everything is lost on restart.
#[derive(Default)]
pub struct InMemoryFlowStore {
    states: RwLock<HashMap<SessionKey, SessionFlowState>>,
}

impl InMemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowStateStore for InMemoryFlowStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionFlowState>, DatabaseError> {
        Ok(self.states.read().await.get(key).cloned())
    }

    async fn save(&self, key: &SessionKey, state: &SessionFlowState) -> Result<(), DatabaseError> {
        self.states.write().await.insert(key.clone(), state.clone());
        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<bool, DatabaseError> {
        Ok(self.states.write().await.remove(key).is_some())
    }

    async fn list_keys(&self) -> Result<Vec<SessionKey>, DatabaseError> {
        let mut keys: Vec<SessionKey> = self.states.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Single-flight locks keyed by session.
///
/// Two turns of the same session must not interleave; turns of different
/// sessions never contend. An entry lives only while someone holds or waits
/// on it.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionKey, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire(&self, key: &SessionKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Run `work` with exclusive access to `key`, then drop the entry if idle.
    pub async fn with_lock<F: Future>(&self, key: &SessionKey, work: F) -> F::Output {
        let guard = self.acquire(key).await;
        let output = work.await;
        drop(guard);
        self.release_idle(key).await;
        output
    }

    /// Remove the entry for `key` unless another task holds or awaits it.
    pub async fn release_idle(&self, key: &SessionKey) {
        let mut locks = self.locks.lock().await;
        // The map's own reference is the only one left.
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    /// Forget the lock for a finished session.
    pub async fn release(&self, key: &SessionKey) {
        self.locks.lock().await.remove(key);
    }

    /// Number of sessions with a live lock entry.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

//! Per-owner mutual exclusion for namespace mutations.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use treehub_core::types::OwnerId;

/// One async mutex per owner, created on first use.
///
/// Mutations of the same owner are serialized; different owners never
/// block each other.
#[derive(Debug, Default)]
pub struct OwnerLocks {
    locks: DashMap<OwnerId, Arc<Mutex<()>>>,
}

/// Held while an owner's stores are being mutated.
pub type OwnerGuard = OwnedMutexGuard<()>;

impl OwnerLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `owner`.
    pub async fn lock(&self, owner: OwnerId) -> OwnerGuard {
        let mutex = self
            .locks
            .entry(owner)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Take the lock only if nobody holds it.
    pub fn try_lock(&self, owner: OwnerId) -> Option<OwnerGuard> {
        let mutex = self
            .locks
            .entry(owner)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.try_lock_owned().ok()
    }
}

//! Per-container serialisation of ordering mutations.
//!
//! Reorder and append both read the current positions before writing. Two such
//! operations on one container must not interleave, so each runs while holding that
//! container's lock. Different containers proceed independently. Entries are dropped
//! once no caller holds or waits on them, so the map stays bounded by live work.

use crate::types::ContainerRef;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

#[derive(Default)]
pub struct ContainerLockManager {
    locks: RwLock<HashMap<ContainerRef, Arc<Mutex<()>>>>,
}

impl ContainerLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, container: &ContainerRef) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().get(container) {
            return Arc::clone(lock);
        }
        let mut locks = self.locks.write();
        Arc::clone(locks.entry(*container).or_default())
    }

    /// Run `f` while holding the lock of `container`.
    pub fn with_lock<R>(&self, container: &ContainerRef, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(container);
        let result = {
            let _guard = lock.lock();
            trace!(container = %container, "Container lock acquired");
            f()
        };
        drop(lock);
        self.evict_idle(container);
        result
    }

    /// Remove the entry when the map holds the only reference. Clones are only taken
    /// under the map lock, so nobody can be waiting on an entry removed here.
    fn evict_idle(&self, container: &ContainerRef) {
        let mut locks = self.locks.write();
        if locks
            .get(container)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(container);
        }
    }

    /// Number of containers currently locked or waited on.
    pub fn tracked(&self) -> usize {
        self.locks.read().len()
    }
}

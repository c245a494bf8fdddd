//! Store registry: concurrency-safe mapping from store identity to its
//! usage trackers.
//!
//! Foreground calls mutate the map while the background worker iterates a
//! per-cycle snapshot; readers and writers never block each other for the
//! duration of a cycle. Keys are `Arc` pointer identities, so two clones
//! of the same store handle address the same entry.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::monitor::tracker::{DiskState, UsageTracker};
use crate::store::MonitoredStore;

/// Identity key for a registered store.
fn store_key(store: &Arc<dyn MonitoredStore>) -> usize {
    Arc::as_ptr(store).cast::<()>() as usize
}

struct StoreEntry {
    store: Arc<dyn MonitoredStore>,
    trackers: Vec<Arc<UsageTracker>>,
}

/// Maps each registered store to the trackers for its directories.
#[derive(Default)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<usize, StoreEntry>>,
}

impl StoreRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store with its trackers. Re-registering replaces the
    /// previous entry.
    pub fn insert(&self, store: Arc<dyn MonitoredStore>, trackers: Vec<Arc<UsageTracker>>) {
        let key = store_key(&store);
        self.stores
            .write()
            .insert(key, StoreEntry { store, trackers });
    }

    /// Delete a store's entry. Returns whether it was registered. A
    /// tracker mid-poll in the current cycle is simply skipped in future
    /// cycles; no cancellation is needed.
    pub fn remove(&self, store: &Arc<dyn MonitoredStore>) -> bool {
        self.stores.write().remove(&store_key(store)).is_some()
    }

    /// Immutable per-cycle snapshot for background iteration. Structural
    /// changes after the snapshot never fault the cycle; a store removed
    /// mid-cycle may still be polled once more (acceptable staleness).
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Arc<dyn MonitoredStore>, Vec<Arc<UsageTracker>>)> {
        self.stores
            .read()
            .values()
            .map(|entry| (Arc::clone(&entry.store), entry.trackers.clone()))
            .collect()
    }

    /// Point query for one volume's state. `None` for an unknown
    /// store/directory pair; callers treat that as normal, since no
    /// monitoring implies no reported problem.
    #[must_use]
    pub fn state_of(&self, store: &Arc<dyn MonitoredStore>, dir: &Path) -> Option<DiskState> {
        let stores = self.stores.read();
        let entry = stores.get(&store_key(store))?;
        entry
            .trackers
            .iter()
            .find(|tracker| tracker.path() == dir)
            .map(|tracker| tracker.state())
    }

    pub fn clear(&self) {
        self.stores.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }
}

//! # Keyed Locks
//!
//! One async mutex per (venue, product). A write holds its product's lock
//! from the moment it loads the book until the transaction commits, so two
//! sales of the same product in this process never race; different products
//! proceed in parallel.
//!
//! ```text
//! record_sale(v1, cola) ──┐
//!                         ├──► lock(v1, cola) ──► load → record → save
//! record_sale(v1, cola) ──┘        (waits)
//!
//! record_sale(v1, chips) ────► lock(v1, chips) ──► runs concurrently
//! ```
//!
//! Writers in other processes are caught by the row version check instead.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

type LockKey = (String, String);

/// Per-key async mutexes, created on first use.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<LockKey, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and takes the lock for one product at one venue.
    ///
    /// The lock is released when the guard is dropped.
    pub async fn lock(&self, venue_id: &str, product_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().await;
            map.entry((venue_id.to_string(), product_id.to_string()))
                .or_default()
                .clone()
        };

        trace!(venue_id = %venue_id, product_id = %product_id, "Waiting for product lock");
        slot.lock_owned().await
    }

    /// Releases a guard taken with [`lock`](Self::lock) and forgets every
    /// key that is now idle, so the map only tracks products in use.
    pub async fn release(&self, guard: OwnedMutexGuard<()>) -> usize {
        drop(guard);
        let pruned = self.prune().await;
        if pruned > 0 {
            trace!(pruned, "Pruned idle product locks");
        }
        pruned
    }

    /// Drops mutexes nobody is holding or waiting on.
    pub async fn prune(&self) -> usize {
        let mut map = self.inner.lock().await;
        let before = map.len();
        map.retain(|_, slot| Arc::strong_count(slot) > 1);
        before - map.len()
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

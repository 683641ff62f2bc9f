//! Change feed keyed by entity name.
//!
//! Listeners live in a handle table: registering returns a
//! [`RegistrationToken`] and the table holds the only strong reference to
//! the callback. Callbacks that need to reach a subscription hold a `Weak`
//! to it, so a notification racing with teardown finds nothing to upgrade
//! and does nothing.
//!
//! Emission snapshots the matching listeners under the lock and calls them
//! after releasing it, so a callback may register or deregister freely.

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tidepool_core::ObjectId;

/// Handle returned by [`ChangeFeed::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationToken(u64);

impl RegistrationToken {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Objects touched by one save, for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeEvent {
    pub entity: String,
    pub inserted: Vec<ObjectId>,
    pub updated: Vec<ObjectId>,
    pub deleted: Vec<ObjectId>,
}

impl ChangeEvent {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Number of touched objects.
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }
}

/// Closure type for change listeners.
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Registration table of change listeners.
pub struct ChangeFeed {
    listeners: Mutex<IndexMap<u64, (String, ChangeListener)>>,
    next_id: AtomicU64,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(IndexMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Listen for changes to `entity`.
    pub fn register(&self, entity: impl Into<String>, listener: ChangeListener) -> RegistrationToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, (entity.into(), listener));
        RegistrationToken(id)
    }

    /// Remove a listener. Unknown or already removed tokens are ignored.
    pub fn deregister(&self, token: RegistrationToken) -> bool {
        self.listeners.lock().shift_remove(&token.0).is_some()
    }

    /// Deliver `event` to every listener of its entity.
    ///
    /// Returns how many listeners were called.
    pub fn emit(&self, event: &ChangeEvent) -> usize {
        let snapshot: Vec<ChangeListener> = {
            let guard = self.listeners.lock();
            guard
                .values()
                .filter(|(entity, _)| *entity == event.entity)
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }

    /// Number of registered listeners across all entities.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    /// Number of listeners registered for `entity`.
    pub fn listeners_for(&self, entity: &str) -> usize {
        self.listeners
            .lock()
            .values()
            .filter(|(e, _)| e == entity)
            .count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

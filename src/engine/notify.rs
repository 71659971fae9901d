//! Change notification bus
//!
//! The single choke point through which every mutating path routes its
//! before/after effective values. Listeners observe exactly the
//! transitions that actually changed a value, delivered synchronously in
//! registration order on the mutating thread.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use log::{debug, warn};

use crate::schema::FigValue;

/// A change to an option's effective value
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Key of the changed option
    pub key: String,
    /// Effective value before the change
    pub old: Option<FigValue>,
    /// Effective value after the change
    pub new: Option<FigValue>,
}

/// Change listener type
pub type ChangeListener = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Handle identifying a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Change notification bus
#[derive(Default)]
pub struct ChangeBus {
    listeners: RwLock<Vec<(ListenerId, ChangeListener)>>,
    next_id: AtomicU64,
}

impl ChangeBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a change listener, returning a handle for removal
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write().unwrap();
        listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener by handle. Removing an unknown handle is a no-op.
    pub fn remove_listener(&self, id: ListenerId) {
        let mut listeners = self.listeners.write().unwrap();
        listeners.retain(|(lid, _)| *lid != id);
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap().len()
    }

    /// Fire a change event to every listener iff `old` and `new` differ
    /// under value equality.
    ///
    /// A panicking listener is isolated and reported; remaining listeners
    /// still run.
    pub fn notify_if_changed(&self, key: &str, old: Option<FigValue>, new: Option<FigValue>) {
        if old == new {
            return;
        }

        debug!("{} changed from {:?} to {:?}", key, old, new);

        let event = ChangeEvent {
            key: key.to_string(),
            old,
            new,
        };

        let listeners = self.listeners.read().unwrap();
        for (id, listener) in listeners.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                warn!("Change listener {:?} panicked handling {}", id, key);
            }
        }
    }
}

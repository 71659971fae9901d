//! Dynamic property sources
//!
//! This module defines the trait through which the engine consumes an
//! external dynamic property source, plus an in-memory reference
//! implementation used by tests and simple embeddings. The engine makes
//! no assumption about delivery thread or cadence; a push-capable source
//! invokes the subscribed callback on whatever thread it owns.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;

use crate::schema::FigValue;

/// Callback invoked by a push-capable source when a key's value changes
pub type SourceCallback = Arc<dyn Fn(&str, Option<FigValue>) + Send + Sync>;

/// How a source delivers updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The source invokes subscribed callbacks on change
    Push,
    /// The source must be polled with `current_value`
    PollOnly,
}

/// Dynamic property source trait
pub trait PropertySource: Send + Sync {
    /// Get the current value of a key, if the source knows it
    fn current_value(&self, key: &str) -> Option<FigValue>;

    /// Get the delivery mode of this source
    fn delivery(&self) -> Delivery;

    /// Subscribe to change notifications.
    ///
    /// Poll-only sources ignore the subscription; the default does
    /// nothing.
    fn subscribe(&self, _callback: SourceCallback) {}
}

/// In-memory push-capable property source
///
/// Holds a plain key/value map and pushes every `set` to subscribers.
#[derive(Default)]
pub struct MemorySource {
    values: RwLock<HashMap<String, FigValue>>,
    subscribers: RwLock<Vec<SourceCallback>>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source seeded with initial values
    pub fn with_values(values: HashMap<String, FigValue>) -> Self {
        Self {
            values: RwLock::new(values),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Set a key's value and push the change to all subscribers
    pub fn set(&self, key: &str, value: FigValue) {
        debug!("MemorySource: {} = {}", key, value);
        {
            let mut values = self.values.write().unwrap();
            values.insert(key.to_string(), value.clone());
        }

        let subscribers = self.subscribers.read().unwrap();
        for callback in subscribers.iter() {
            callback(key, Some(value.clone()));
        }
    }

    /// Remove a key and push the removal to all subscribers
    pub fn remove(&self, key: &str) {
        debug!("MemorySource: {} removed", key);
        {
            let mut values = self.values.write().unwrap();
            values.remove(key);
        }

        let subscribers = self.subscribers.read().unwrap();
        for callback in subscribers.iter() {
            callback(key, None);
        }
    }
}

impl PropertySource for MemorySource {
    fn current_value(&self, key: &str) -> Option<FigValue> {
        let values = self.values.read().unwrap();
        values.get(key).cloned()
    }

    fn delivery(&self) -> Delivery {
        Delivery::Push
    }

    fn subscribe(&self, callback: SourceCallback) {
        let mut subscribers = self.subscribers.write().unwrap();
        subscribers.push(callback);
    }
}

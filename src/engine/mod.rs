//! Resolution engine
//!
//! This module composes the option registry, change bus, and external
//! property source into the single entry point clients use to read
//! effective values and mutate override/bypass state.
//!
//! Every mutating path (live-value push, override set/clear, bypass
//! set/clear) routes its before/after effective values through the change
//! bus, so listeners observe exactly the transitions that changed a value.

mod notify;
mod option_state;
mod registry;

pub use self::notify::{ChangeBus, ChangeEvent, ChangeListener, ListenerId};
pub use self::option_state::{OptionState, Slot};
pub use self::registry::OptionRegistry;

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::common::Result;
use crate::env;
use crate::rules::{BypassSet, OverrideSet};
use crate::schema::{FigValue, Schema};
use crate::source::{Delivery, PropertySource};

/// Source id recorded for single-key override/bypass calls
const DIRECT_SOURCE: &str = "direct";

/// Layered configuration resolution engine
///
/// Owns one registry of option states built from a schema, seeded from an
/// external property source, and a change notification bus.
pub struct FigEngine {
    registry: OptionRegistry,
    bus: ChangeBus,
    source: Arc<dyn PropertySource>,
}

impl FigEngine {
    /// Create an engine from a schema.
    ///
    /// Each option's live value is seeded from the source's current value;
    /// the parsed default stays a separate bottom layer so it backs the
    /// option again whenever the source withdraws the key. A push-capable
    /// source is subscribed immediately; poll-driven embeddings call
    /// `on_live_value_changed` themselves.
    pub fn new(schema: &Schema, source: Arc<dyn PropertySource>) -> Result<Arc<Self>> {
        let engine = Arc::new(Self {
            registry: OptionRegistry::new(),
            bus: ChangeBus::new(),
            source: Arc::clone(&source),
        });

        for decl in &schema.options {
            let default = decl.kind.parse_default(&decl.key, decl.default.as_deref())?;
            let live = source.current_value(&decl.key);
            engine.registry.add(&decl.key, &decl.alias, decl.kind, live, default);
        }

        if source.delivery() == Delivery::Push {
            Self::attach_source(&engine);
        }

        Ok(engine)
    }

    /// Subscribe an engine to its property source's change callback.
    ///
    /// The subscription holds only a weak handle, so the source never
    /// keeps a dropped engine alive.
    pub fn attach_source(engine: &Arc<Self>) {
        let weak = Arc::downgrade(engine);
        engine.source.subscribe(Arc::new(move |key, value| {
            if let Some(engine) = weak.upgrade() {
                engine.on_live_value_changed(key, value);
            }
        }));
    }

    /// Get the effective value of an option by key or alias.
    ///
    /// Never fails for a registered option; only unknown keys error.
    pub fn get(&self, key_or_alias: &str) -> Result<Option<FigValue>> {
        Ok(self.registry.resolve(key_or_alias)?.effective_value())
    }

    /// Set or clear a single-key override. `None` clears.
    pub fn set_override(&self, key_or_alias: &str, raw: Option<&str>) -> Result<()> {
        let state = self.registry.resolve(key_or_alias)?;
        state.set_override(DIRECT_SOURCE, raw)?;
        self.record_and_notify(&state);
        Ok(())
    }

    /// Set or clear a single-key bypass. `None` clears.
    pub fn set_bypass(&self, key_or_alias: &str, raw: Option<&str>) -> Result<()> {
        let state = self.registry.resolve(key_or_alias)?;
        state.set_bypass(DIRECT_SOURCE, raw)?;
        self.record_and_notify(&state);
        Ok(())
    }

    /// Apply an override set under the current deployment environment.
    ///
    /// Returns false (and mutates nothing) when the set's environments do
    /// not match; this is a normal outcome, not an error.
    pub fn apply_override_set(&self, set: &OverrideSet) -> Result<bool> {
        match self.registry.apply_override_set(set, env::deployment_env())? {
            Some(affected) => {
                self.notify_affected(&affected);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Clear the active override set
    pub fn clear_override_set(&self) -> Result<()> {
        let affected = self.registry.clear_override_set()?;
        self.notify_affected(&affected);
        Ok(())
    }

    /// Apply a bypass set under the current deployment environment.
    ///
    /// A new bypass set fully replaces the old one; entries no longer
    /// present are cleared.
    pub fn apply_bypass_set(&self, set: &BypassSet) -> Result<bool> {
        match self.registry.apply_bypass_set(set, env::deployment_env())? {
            Some(affected) => {
                self.notify_affected(&affected);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Clear the active bypass set
    pub fn clear_bypass_set(&self) -> Result<()> {
        let affected = self.registry.clear_bypass_set()?;
        self.notify_affected(&affected);
        Ok(())
    }

    /// Entry point for the external source's change callback.
    ///
    /// Updates the live layer and notifies listeners iff the effective
    /// value actually changed; an active bypass or override masks the
    /// live layer and suppresses the event. Keys the engine does not own
    /// are ignored.
    pub fn on_live_value_changed(&self, key: &str, new: Option<FigValue>) {
        let state = match self.registry.option(key) {
            Some(state) => state,
            None => {
                debug!("Ignoring live value change for unknown key {}", key);
                return;
            }
        };

        let prior = state.record_live_value(new);
        debug!("Live value of {} updated (was {:?})", key, prior);
        self.record_and_notify(&state);
    }

    /// Add a change listener
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.bus.add_listener(listener)
    }

    /// Remove a change listener
    pub fn remove_listener(&self, id: ListenerId) {
        self.bus.remove_listener(id);
    }

    /// Snapshot of all option states
    pub fn options(&self) -> Vec<Arc<OptionState>> {
        self.registry.options()
    }

    /// Get one option state by key
    pub fn option(&self, key: &str) -> Option<Arc<OptionState>> {
        self.registry.option(key)
    }

    /// Get an option's key by its alias
    pub fn key_by_alias(&self, alias: &str) -> Option<String> {
        self.registry.key_by_alias(alias)
    }

    /// Get an option's effective value by its alias
    pub fn value_by_alias(&self, alias: &str) -> Option<FigValue> {
        let key = self.registry.key_by_alias(alias)?;
        self.registry.option(&key)?.effective_value()
    }

    /// Get the currently active override set, if any
    pub fn active_override_set(&self) -> Option<OverrideSet> {
        self.registry.active_override_set()
    }

    /// Get the currently active bypass set, if any
    pub fn active_bypass_set(&self) -> Option<BypassSet> {
        self.registry.active_bypass_set()
    }

    /// Filter an inbound property collection down to the entries whose
    /// keys match a registered option. The argument is not modified.
    pub fn filter_options(&self, properties: &HashMap<String, String>) -> HashMap<String, String> {
        let mut filtered = HashMap::new();
        for state in self.registry.options() {
            if let Some(value) = properties.get(state.key()) {
                filtered.insert(state.key().to_string(), value.clone());
            }
        }
        filtered
    }

    /// Filter a JSON object down to the entries whose keys match a
    /// registered option. The argument is not modified.
    pub fn filter_json(
        &self,
        entries: &serde_json::Map<String, serde_json::Value>,
    ) -> serde_json::Map<String, serde_json::Value> {
        let mut filtered = serde_json::Map::new();
        for state in self.registry.options() {
            if let Some(value) = entries.get(state.key()) {
                filtered.insert(state.key().to_string(), value.clone());
            }
        }
        filtered
    }

    fn record_and_notify(&self, state: &OptionState) {
        let (old, new) = state.record_effective();
        self.bus.notify_if_changed(state.key(), old, new);
    }

    fn notify_affected(&self, affected: &[Arc<OptionState>]) {
        for state in affected {
            self.record_and_notify(state);
        }
    }
}

//! Per-option layered state
//!
//! Each declared option owns one `OptionState` holding its live value,
//! override slot, bypass slot, and the previous effective value used for
//! change diffing. Every state guards its own fields with a lock scoped
//! to that key; unrelated keys never contend.

use std::sync::Mutex;

use log::info;

use crate::common::Result;
use crate::schema::{FigValue, OptionKind};

/// An active override or bypass entry: where it came from and what it
/// parsed to
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Source id: a rule set name, or "direct" for single-key calls
    pub source: String,
    /// Raw value text as supplied
    pub raw: String,
    parsed: FigValue,
}

#[derive(Debug)]
struct Inner {
    live: Option<FigValue>,
    previous_effective: Option<FigValue>,
    override_slot: Option<Slot>,
    bypass_slot: Option<Slot>,
}

/// State of one configuration option
#[derive(Debug)]
pub struct OptionState {
    key: String,
    alias: String,
    kind: OptionKind,
    default: Option<FigValue>,
    inner: Mutex<Inner>,
}

impl OptionState {
    /// Create an option state seeded with the source's current value.
    ///
    /// The parsed default is kept as the bottom layer: it backs the
    /// effective value whenever the live layer is absent, including
    /// after the source removes a key it previously supplied.
    pub fn new(
        key: &str,
        alias: &str,
        kind: OptionKind,
        live: Option<FigValue>,
        default: Option<FigValue>,
    ) -> Self {
        Self {
            key: key.to_string(),
            alias: alias.to_string(),
            kind,
            inner: Mutex::new(Inner {
                previous_effective: live.clone().or_else(|| default.clone()),
                live,
                override_slot: None,
                bypass_slot: None,
            }),
            default,
        }
    }

    /// Get the option key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the option alias
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Get the declared kind
    pub fn kind(&self) -> OptionKind {
        self.kind
    }

    /// Compute the effective value: bypass if set, else override if set,
    /// else the live value, else the declared default
    pub fn effective_value(&self) -> Option<FigValue> {
        let inner = self.inner.lock().unwrap();
        self.effective_of(&inner)
    }

    fn effective_of(&self, inner: &Inner) -> Option<FigValue> {
        if let Some(slot) = &inner.bypass_slot {
            return Some(slot.parsed.clone());
        }
        if let Some(slot) = &inner.override_slot {
            return Some(slot.parsed.clone());
        }
        inner.live.clone().or_else(|| self.default.clone())
    }

    /// Get the current live value
    pub fn live_value(&self) -> Option<FigValue> {
        self.inner.lock().unwrap().live.clone()
    }

    /// Get the declared default value
    pub fn default_value(&self) -> Option<FigValue> {
        self.default.clone()
    }

    /// Get the effective value as of the last observed change
    pub fn previous_effective(&self) -> Option<FigValue> {
        self.inner.lock().unwrap().previous_effective.clone()
    }

    /// Check whether an override is active
    pub fn is_overridden(&self) -> bool {
        self.inner.lock().unwrap().override_slot.is_some()
    }

    /// Check whether a bypass is active
    pub fn is_bypassed(&self) -> bool {
        self.inner.lock().unwrap().bypass_slot.is_some()
    }

    /// Get the active override entry, if any
    pub fn override_entry(&self) -> Option<Slot> {
        self.inner.lock().unwrap().override_slot.clone()
    }

    /// Get the active bypass entry, if any
    pub fn bypass_entry(&self) -> Option<Slot> {
        self.inner.lock().unwrap().bypass_slot.clone()
    }

    /// Set or clear the override.
    ///
    /// `None` clears; `Some(raw)` parses with the declared kind and
    /// replaces any prior override. On a conversion failure the prior
    /// state is left untouched.
    pub fn set_override(&self, source: &str, raw: Option<&str>) -> Result<()> {
        let slot = self.parse_slot(source, raw)?;
        let mut inner = self.inner.lock().unwrap();

        match &slot {
            Some(entry) => info!(
                "Option {} had value {} overridden by {} ({})",
                self.key,
                fmt_value(&self.effective_of(&inner)),
                entry.raw,
                source
            ),
            None => info!("Option {} override cleared", self.key),
        }

        inner.override_slot = slot;
        Ok(())
    }

    /// Set or clear the bypass. Same contract as `set_override`,
    /// operating on the bypass slot.
    pub fn set_bypass(&self, source: &str, raw: Option<&str>) -> Result<()> {
        let slot = self.parse_slot(source, raw)?;
        let mut inner = self.inner.lock().unwrap();

        match &slot {
            Some(entry) => info!(
                "Option {} had value {} bypassed by {} ({})",
                self.key,
                fmt_value(&self.effective_of(&inner)),
                entry.raw,
                source
            ),
            None => info!("Option {} bypass cleared", self.key),
        }

        inner.bypass_slot = slot;
        Ok(())
    }

    fn parse_slot(&self, source: &str, raw: Option<&str>) -> Result<Option<Slot>> {
        match raw {
            None => Ok(None),
            Some(text) => {
                let parsed = self.kind.parse(&self.key, text)?;
                Ok(Some(Slot {
                    source: source.to_string(),
                    raw: text.to_string(),
                    parsed,
                }))
            }
        }
    }

    /// Record a live value pushed by the external source, returning the
    /// value held immediately prior.
    ///
    /// The caller needs the prior value only indirectly: whether a
    /// notification fires is decided by the effective-value diff, since
    /// an active bypass or override may be masking the live layer.
    pub fn record_live_value(&self, new: Option<FigValue>) -> Option<FigValue> {
        let mut inner = self.inner.lock().unwrap();
        std::mem::replace(&mut inner.live, new)
    }

    /// Commit the current effective value as the new previous one and
    /// return the `(old, new)` pair for the diff protocol.
    pub fn record_effective(&self) -> (Option<FigValue>, Option<FigValue>) {
        let mut inner = self.inner.lock().unwrap();
        let new = self.effective_of(&inner);
        let old = std::mem::replace(&mut inner.previous_effective, new.clone());
        (old, new)
    }
}

fn fmt_value(value: &Option<FigValue>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "null".to_string(),
    }
}

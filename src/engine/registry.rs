//! Option registry
//!
//! Owns the full set of option states for one schema instance, with
//! lookup by key or alias and batch apply/clear of override and bypass
//! rule sets. The registry is grow-only: options are registered once and
//! never removed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use log::{debug, info};

use crate::common::{FigError, Result};
use crate::engine::option_state::OptionState;
use crate::env::{self, Env};
use crate::rules::{BypassSet, OverrideSet};
use crate::schema::{FigValue, OptionKind};

/// Registry of option states, keyed by option key with a secondary alias
/// table
#[derive(Default)]
pub struct OptionRegistry {
    options: RwLock<HashMap<String, Arc<OptionState>>>,
    aliases: RwLock<HashMap<String, Arc<OptionState>>>,
    active_overrides: RwLock<Option<OverrideSet>>,
    active_bypass: RwLock<Option<BypassSet>>,
}

impl OptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an option.
    ///
    /// Re-registering an existing key overwrites the previous option
    /// state (schema redefinition is last-write-wins).
    pub fn add(
        &self,
        key: &str,
        alias: &str,
        kind: OptionKind,
        live: Option<FigValue>,
        default: Option<FigValue>,
    ) -> Arc<OptionState> {
        let state = Arc::new(OptionState::new(key, alias, kind, live, default));

        let mut options = self.options.write().unwrap();
        let mut aliases = self.aliases.write().unwrap();

        if let Some(old) = options.insert(key.to_string(), Arc::clone(&state)) {
            debug!("Option {} redefined, dropping prior state", key);
            aliases.remove(old.alias());
        }
        aliases.insert(alias.to_string(), Arc::clone(&state));

        state
    }

    /// Look up an option state by key or alias
    pub fn resolve(&self, key_or_alias: &str) -> Result<Arc<OptionState>> {
        if let Some(state) = self.options.read().unwrap().get(key_or_alias) {
            return Ok(Arc::clone(state));
        }
        if let Some(state) = self.aliases.read().unwrap().get(key_or_alias) {
            return Ok(Arc::clone(state));
        }
        Err(FigError::UnknownKey(key_or_alias.to_string()))
    }

    /// Get an option state by key only
    pub fn option(&self, key: &str) -> Option<Arc<OptionState>> {
        self.options.read().unwrap().get(key).map(Arc::clone)
    }

    /// Snapshot of all option states
    pub fn options(&self) -> Vec<Arc<OptionState>> {
        self.options.read().unwrap().values().map(Arc::clone).collect()
    }

    /// Get the key of an option by its alias
    pub fn key_by_alias(&self, alias: &str) -> Option<String> {
        self.aliases
            .read()
            .unwrap()
            .get(alias)
            .map(|state| state.key().to_string())
    }

    /// Get the currently active override set, if any
    pub fn active_override_set(&self) -> Option<OverrideSet> {
        self.active_overrides.read().unwrap().clone()
    }

    /// Get the currently active bypass set, if any
    pub fn active_bypass_set(&self) -> Option<BypassSet> {
        self.active_bypass.read().unwrap().clone()
    }

    /// Apply an override set if it is in force under `current`.
    ///
    /// Returns `None` when the environment does not match (no mutation);
    /// otherwise the affected option states. The batch is atomic: every
    /// pair is resolved and parsed before any state is mutated, so a
    /// failure leaves the registry untouched.
    pub fn apply_override_set(
        &self,
        set: &OverrideSet,
        current: Env,
    ) -> Result<Option<Vec<Arc<OptionState>>>> {
        if !env::is_active(&set.environments, current) {
            debug!(
                "Override set '{}' not in force: current env {} not in {:?}",
                set.name, current, set.environments
            );
            return Ok(None);
        }

        let resolved = self.validate_batch(&set.name, set.options.iter())?;

        for (state, raw) in &resolved {
            state.set_override(&set.name, Some(raw.as_str()))?;
        }

        info!("Applied override set '{}' ({} options)", set.name, resolved.len());
        *self.active_overrides.write().unwrap() = Some(set.clone());

        Ok(Some(resolved.into_iter().map(|(state, _)| state).collect()))
    }

    /// Clear the active override set, returning the affected states
    pub fn clear_override_set(&self) -> Result<Vec<Arc<OptionState>>> {
        let set = match self.active_overrides.write().unwrap().take() {
            Some(set) => set,
            None => return Ok(Vec::new()),
        };

        let mut affected = Vec::with_capacity(set.options.len());
        for rule in &set.options {
            let state = self.resolve(&rule.key)?;
            state.set_override(&set.name, None)?;
            affected.push(state);
        }

        info!("Cleared override set '{}'", set.name);
        Ok(affected)
    }

    /// Apply a bypass set if it is in force under `current`.
    ///
    /// A new bypass set fully replaces the old one: entries of the
    /// previously active set absent from the new set are cleared first.
    /// Same atomicity contract as `apply_override_set`.
    pub fn apply_bypass_set(
        &self,
        set: &BypassSet,
        current: Env,
    ) -> Result<Option<Vec<Arc<OptionState>>>> {
        if !env::is_active(&set.environments, current) {
            debug!(
                "Bypass set not in force: current env {} not in {:?}",
                current, set.environments
            );
            return Ok(None);
        }

        let resolved = self.validate_batch("bypass", set.options.iter())?;

        let new_keys: HashSet<&str> = set.options.iter().map(|rule| rule.key.as_str()).collect();
        let mut affected = Vec::new();

        // Full replace: clear stale entries from the prior set first.
        if let Some(old) = self.active_bypass.read().unwrap().as_ref() {
            for rule in &old.options {
                if !new_keys.contains(rule.key.as_str()) {
                    let state = self.resolve(&rule.key)?;
                    state.set_bypass("bypass", None)?;
                    affected.push(state);
                }
            }
        }

        for (state, raw) in &resolved {
            state.set_bypass("bypass", Some(raw.as_str()))?;
        }
        affected.extend(resolved.into_iter().map(|(state, _)| state));

        info!("Applied bypass set ({} options)", set.options.len());
        *self.active_bypass.write().unwrap() = Some(set.clone());

        Ok(Some(affected))
    }

    /// Clear the active bypass set, returning the affected states
    pub fn clear_bypass_set(&self) -> Result<Vec<Arc<OptionState>>> {
        let set = match self.active_bypass.write().unwrap().take() {
            Some(set) => set,
            None => return Ok(Vec::new()),
        };

        let mut affected = Vec::with_capacity(set.options.len());
        for rule in &set.options {
            let state = self.resolve(&rule.key)?;
            state.set_bypass("bypass", None)?;
            affected.push(state);
        }

        info!("Cleared bypass set");
        Ok(affected)
    }

    /// Resolve and parse every pair of a batch before mutating anything.
    fn validate_batch<'a>(
        &self,
        set_name: &str,
        rules: impl Iterator<Item = &'a crate::rules::RuleOption>,
    ) -> Result<Vec<(Arc<OptionState>, String)>> {
        let mut resolved = Vec::new();
        for rule in rules {
            let state = self
                .resolve(&rule.key)
                .map_err(|e| batch_error(set_name, e))?;
            state
                .kind()
                .parse(state.key(), &rule.value)
                .map_err(|e| batch_error(set_name, e))?;
            resolved.push((state, rule.value.clone()));
        }
        Ok(resolved)
    }
}

fn batch_error(set: &str, source: FigError) -> FigError {
    FigError::Batch {
        set: set.to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;

    fn registry_with_port() -> OptionRegistry {
        let registry = OptionRegistry::new();
        registry.add(
            "svc.port",
            "getPort",
            OptionKind::Int64,
            Some(FigValue::Int(8345)),
            Some(FigValue::Int(8080)),
        );
        registry
    }

    fn add_max_conn(registry: &OptionRegistry) {
        registry.add(
            "svc.maxConn",
            "getMaxConn",
            OptionKind::Int64,
            Some(FigValue::Int(64)),
            Some(FigValue::Int(32)),
        );
    }

    #[test]
    fn test_resolve_by_key_and_alias() {
        let registry = registry_with_port();
        assert_eq!(registry.resolve("svc.port").unwrap().key(), "svc.port");
        assert_eq!(registry.resolve("getPort").unwrap().key(), "svc.port");
    }

    #[test]
    fn test_resolve_unknown_key() {
        let registry = registry_with_port();
        match registry.resolve("nope") {
            Err(FigError::UnknownKey(key)) => assert_eq!(key, "nope"),
            other => panic!("expected unknown key error, got {:?}", other),
        }
    }

    #[test]
    fn test_redefinition_is_last_write_wins() {
        let registry = registry_with_port();
        registry.add("svc.port", "getServicePort", OptionKind::Int64, Some(FigValue::Int(9)), None);

        assert_eq!(
            registry.resolve("svc.port").unwrap().live_value(),
            Some(FigValue::Int(9))
        );
        assert_eq!(registry.resolve("getServicePort").unwrap().key(), "svc.port");
        // The stale alias is gone with the old state.
        assert!(registry.resolve("getPort").is_err());
    }

    #[test]
    fn test_apply_override_set_env_mismatch() {
        let registry = registry_with_port();
        let set = OverrideSet::new("prod-tuning")
            .environment(Env::Prod)
            .option("svc.port", "9999");

        let outcome = registry.apply_override_set(&set, Env::Unit).unwrap();
        assert!(outcome.is_none());
        assert_eq!(
            registry.resolve("svc.port").unwrap().effective_value(),
            Some(FigValue::Int(8345))
        );
        assert!(registry.active_override_set().is_none());
    }

    #[test]
    fn test_apply_override_set_all_env_always_applies() {
        let registry = registry_with_port();
        let set = OverrideSet::new("global")
            .environment(Env::All)
            .option("svc.port", "9999");

        let affected = registry.apply_override_set(&set, Env::Prod).unwrap().unwrap();
        assert_eq!(affected.len(), 1);
        assert_eq!(
            registry.resolve("svc.port").unwrap().effective_value(),
            Some(FigValue::Int(9999))
        );
    }

    #[test]
    fn test_batch_is_atomic_on_unknown_key() {
        let registry = registry_with_port();
        let set = OverrideSet::new("broken")
            .environment(Env::All)
            .option("svc.port", "9999")
            .option("svc.missing", "1");

        let err = registry.apply_override_set(&set, Env::Unit).unwrap_err();
        assert!(matches!(err, FigError::Batch { .. }));
        // The valid pair earlier in the batch was not applied.
        assert!(!registry.resolve("svc.port").unwrap().is_overridden());
        assert!(registry.active_override_set().is_none());
    }

    #[test]
    fn test_batch_is_atomic_on_conversion_failure() {
        let registry = registry_with_port();
        add_max_conn(&registry);

        let set = OverrideSet::new("broken")
            .environment(Env::All)
            .option("svc.port", "9999")
            .option("svc.maxConn", "not-a-number");

        assert!(registry.apply_override_set(&set, Env::Unit).is_err());
        assert!(!registry.resolve("svc.port").unwrap().is_overridden());
        assert!(!registry.resolve("svc.maxConn").unwrap().is_overridden());
    }

    #[test]
    fn test_clear_override_set() {
        let registry = registry_with_port();
        let set = OverrideSet::new("tuning")
            .environment(Env::All)
            .option("svc.port", "9999");

        registry.apply_override_set(&set, Env::Unit).unwrap();
        assert!(registry.resolve("svc.port").unwrap().is_overridden());

        let affected = registry.clear_override_set().unwrap();
        assert_eq!(affected.len(), 1);
        assert!(!registry.resolve("svc.port").unwrap().is_overridden());
        assert!(registry.active_override_set().is_none());

        // Clearing again is a no-op.
        assert!(registry.clear_override_set().unwrap().is_empty());
    }

    #[test]
    fn test_bypass_set_full_replace() {
        let registry = registry_with_port();
        add_max_conn(&registry);

        let first = BypassSet::new()
            .environment(Env::All)
            .option("svc.port", "100")
            .option("svc.maxConn", "5");
        registry.apply_bypass_set(&first, Env::Unit).unwrap();
        assert!(registry.resolve("svc.port").unwrap().is_bypassed());
        assert!(registry.resolve("svc.maxConn").unwrap().is_bypassed());

        // The second set drops svc.maxConn; its bypass entry must go away.
        let second = BypassSet::new()
            .environment(Env::All)
            .option("svc.port", "200");
        let affected = registry.apply_bypass_set(&second, Env::Unit).unwrap().unwrap();
        assert_eq!(affected.len(), 2);

        assert_eq!(
            registry.resolve("svc.port").unwrap().effective_value(),
            Some(FigValue::Int(200))
        );
        assert!(!registry.resolve("svc.maxConn").unwrap().is_bypassed());
    }
}

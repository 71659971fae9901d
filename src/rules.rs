//! Override and bypass rule sets
//!
//! A rule set is plain, serializable data: a collection of (key, raw
//! value) pairs plus the set of environments it is in force in. Rule
//! sets are constructed by the embedding application however it likes;
//! this module additionally provides JSON file loading.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::common::{FigError, Result};
use crate::env::Env;

/// One (key, raw value) pair inside a rule set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleOption {
    /// Option key or alias
    pub key: String,
    /// Raw value text, parsed with the option's declared kind at apply time
    pub value: String,
}

impl RuleOption {
    /// Create a rule option
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// A named, environment-scoped set of overrides
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverrideSet {
    /// Name of the rule set, used as the override source id
    pub name: String,
    /// Environments this set is in force in
    #[serde(default)]
    pub environments: HashSet<Env>,
    /// Override pairs
    #[serde(default)]
    pub options: Vec<RuleOption>,
}

impl OverrideSet {
    /// Create an empty override set
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            environments: HashSet::new(),
            options: Vec::new(),
        }
    }

    /// Add an environment this set is valid in
    pub fn environment(mut self, env: Env) -> Self {
        self.environments.insert(env);
        self
    }

    /// Add an override pair
    pub fn option(mut self, key: &str, value: &str) -> Self {
        self.options.push(RuleOption::new(key, value));
        self
    }

    /// Load an override set from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_rule_file(path.as_ref())
    }
}

/// An environment-scoped set of bypasses
///
/// Same shape as an override set but unnamed, never layered with other
/// bypass sets, and never routed through the live-value change path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BypassSet {
    /// Environments this set is in force in
    #[serde(default)]
    pub environments: HashSet<Env>,
    /// Bypass pairs
    #[serde(default)]
    pub options: Vec<RuleOption>,
}

impl BypassSet {
    /// Create an empty bypass set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment this set is valid in
    pub fn environment(mut self, env: Env) -> Self {
        self.environments.insert(env);
        self
    }

    /// Add a bypass pair
    pub fn option(mut self, key: &str, value: &str) -> Self {
        self.options.push(RuleOption::new(key, value));
        self
    }

    /// Load a bypass set from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_rule_file(path.as_ref())
    }
}

fn read_rule_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Loading rule set from file: {}", path.display());

    let mut contents = String::new();
    let mut file = File::open(path).map_err(|e| {
        warn!("Failed to open rule set file {}: {}", path.display(), e);
        FigError::FileRead(path.to_path_buf(), e.to_string())
    })?;

    file.read_to_string(&mut contents).map_err(|e| {
        warn!("Failed to read rule set file {}: {}", path.display(), e);
        FigError::FileRead(path.to_path_buf(), e.to_string())
    })?;

    let parsed = serde_json::from_str(&contents).map_err(|e| {
        warn!("Error parsing {}: {}", path.display(), e);
        FigError::Parse(e)
    })?;

    Ok(parsed)
}

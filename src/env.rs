//! Deployment environments
//!
//! This module defines the closed set of deployment environments used to
//! scope override and bypass rule sets, the process-wide deployment
//! context, and the activation check shared by both rule set kinds.

use std::collections::HashSet;
use std::fmt;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Environment variable consulted for the process deployment environment
pub const DEPLOYMENT_ENV_VAR: &str = "LAYERFIG_ENV";

/// Deployment environment tag
///
/// `All` is a wildcard: it matches every environment both when used as the
/// current deployment environment and when present in a rule set's
/// environment list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Env {
    /// Wildcard matching every environment
    All,
    /// Unit testing
    Unit,
    /// Integration testing
    Test,
    /// Performance/chaos testing
    Chop,
    /// Development
    Dev,
    /// Integration staging
    Integ,
    /// Acceptance
    Accept,
    /// Production
    Prod,
}

impl Env {
    /// Convert an environment name into an `Env`.
    ///
    /// Unrecognized or absent names yield `All`. This is deliberately
    /// fail-open rather than an error: an unconfigured process behaves as
    /// if every rule set applies.
    pub fn from_name(name: Option<&str>) -> Self {
        let name = match name {
            Some(n) => n,
            None => return Env::All,
        };

        match name.to_uppercase().as_str() {
            "ALL" => Env::All,
            "UNIT" => Env::Unit,
            "TEST" => Env::Test,
            "CHOP" => Env::Chop,
            "DEV" => Env::Dev,
            "INTEG" => Env::Integ,
            "ACCEPT" => Env::Accept,
            "PROD" => Env::Prod,
            _ => Env::All,
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Env::All => write!(f, "ALL"),
            Env::Unit => write!(f, "UNIT"),
            Env::Test => write!(f, "TEST"),
            Env::Chop => write!(f, "CHOP"),
            Env::Dev => write!(f, "DEV"),
            Env::Integ => write!(f, "INTEG"),
            Env::Accept => write!(f, "ACCEPT"),
            Env::Prod => write!(f, "PROD"),
        }
    }
}

// Process-wide deployment context, seeded once from LAYERFIG_ENV.
static DEPLOYMENT: Lazy<RwLock<Env>> = Lazy::new(|| {
    let env = Env::from_name(std::env::var(DEPLOYMENT_ENV_VAR).ok().as_deref());
    log::debug!("Deployment environment initialized to {}", env);
    RwLock::new(env)
});

/// Get the current process-wide deployment environment
pub fn deployment_env() -> Env {
    *DEPLOYMENT.read().unwrap()
}

/// Set the process-wide deployment environment
///
/// Intended for embedding applications and tests; production processes
/// normally rely on `LAYERFIG_ENV`.
pub fn set_deployment_env(env: Env) {
    log::info!("Deployment environment set to {}", env);
    *DEPLOYMENT.write().unwrap() = env;
}

/// Check whether a rule set scoped to `rule_envs` is in force under
/// `current`.
///
/// True iff the current environment is `All`, the rule set names `All`,
/// or the rule set names the current environment. An empty rule set
/// matches only when the current environment is `All`.
pub fn is_active(rule_envs: &HashSet<Env>, current: Env) -> bool {
    current == Env::All || rule_envs.contains(&Env::All) || rule_envs.contains(&current)
}

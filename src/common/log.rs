//! Logging utilities
//!
//! This module provides helpers for initializing the logging system.

/// Initialize the logging system
///
/// # Parameters
///
/// * `level` - default log level, overridable with `RUST_LOG`
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    env_logger::init_from_env(env);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger() {
        // Initializes the global logger; we only check it does not panic.
        init_logger("debug");
    }
}

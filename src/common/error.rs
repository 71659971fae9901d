//! Error handling module
//!
//! This module defines the error types and result type alias used by the
//! resolution engine.

use thiserror::Error;
use std::path::PathBuf;

use crate::schema::OptionKind;

/// Layerfig error type
#[derive(Error, Debug)]
pub enum FigError {
    /// Lookup by a key or alias that was never registered
    #[error("unknown configuration key or alias: {0}")]
    UnknownKey(String),

    /// A raw override/bypass string could not be parsed into the
    /// option's declared kind
    #[error("cannot convert value {raw:?} for key '{key}' to {kind}")]
    Conversion {
        key: String,
        raw: String,
        kind: OptionKind,
    },

    /// First failure encountered while applying a multi-key rule set;
    /// the registry guarantees no pair of the batch was applied
    #[error("failed to apply rule set '{set}': {source}")]
    Batch {
        set: String,
        #[source]
        source: Box<FigError>,
    },

    /// Error reading a rule set file
    #[error("error reading rule set file {0}: {1}")]
    FileRead(PathBuf, String),

    /// Error parsing a rule set file
    #[error("error parsing rule set: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `FigError`.
pub type Result<T> = std::result::Result<T, FigError>;

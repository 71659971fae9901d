//! Configuration schema
//!
//! This module contains the typed value model and the schema description
//! consumed by the resolution engine: one declaration per option, built
//! once at startup by the binding layer and registered into the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{FigError, Result};

/// A typed configuration value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FigValue {
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Boolean
    Bool(bool),
    /// String
    Str(String),
}

impl fmt::Display for FigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FigValue::Int(v) => write!(f, "{}", v),
            FigValue::Float(v) => write!(f, "{}", v),
            FigValue::Bool(v) => write!(f, "{}", v),
            FigValue::Str(v) => write!(f, "{}", v),
        }
    }
}

/// Declared kind of a configuration option
///
/// Determines how raw override/bypass strings are parsed into values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// 64-bit signed integer
    Int64,
    /// 64-bit float
    Float64,
    /// Boolean
    Bool,
    /// String
    Str,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Int64 => write!(f, "int64"),
            OptionKind::Float64 => write!(f, "float64"),
            OptionKind::Bool => write!(f, "bool"),
            OptionKind::Str => write!(f, "string"),
        }
    }
}

impl OptionKind {
    /// Parse a raw string into a value of this kind.
    ///
    /// String options take the raw text verbatim with no parsing. Bool
    /// parsing accepts `true` case-insensitively and maps everything else
    /// to `false`; it never fails. Numeric kinds fail with a conversion
    /// error naming the key, raw value, and kind.
    pub fn parse(&self, key: &str, raw: &str) -> Result<FigValue> {
        match self {
            OptionKind::Str => Ok(FigValue::Str(raw.to_string())),
            OptionKind::Int64 => raw
                .parse::<i64>()
                .map(FigValue::Int)
                .map_err(|_| self.conversion_error(key, raw)),
            OptionKind::Float64 => raw
                .parse::<f64>()
                .map(FigValue::Float)
                .map_err(|_| self.conversion_error(key, raw)),
            OptionKind::Bool => Ok(FigValue::Bool(raw.eq_ignore_ascii_case("true"))),
        }
    }

    /// Parse an optional default value text.
    ///
    /// A missing default falls back to the kind's zero value for numeric
    /// and bool options; string options fall back to no value at all.
    pub fn parse_default(&self, key: &str, raw: Option<&str>) -> Result<Option<FigValue>> {
        match raw {
            Some(text) => self.parse(key, text).map(Some),
            None => Ok(match self {
                OptionKind::Int64 => Some(FigValue::Int(0)),
                OptionKind::Float64 => Some(FigValue::Float(0.0)),
                OptionKind::Bool => Some(FigValue::Bool(false)),
                OptionKind::Str => None,
            }),
        }
    }

    fn conversion_error(&self, key: &str, raw: &str) -> FigError {
        FigError::Conversion {
            key: key.to_string(),
            raw: raw.to_string(),
            kind: *self,
        }
    }
}

/// One declared configuration option
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionDecl {
    /// Stable key, unique within a schema
    pub key: String,
    /// Secondary lookup name (accessor/method name in the binding layer)
    pub alias: String,
    /// Declared kind
    pub kind: OptionKind,
    /// Default value text, parsed with the declared kind
    pub default: Option<String>,
}

/// A configuration schema: the full set of option declarations for one
/// engine instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    /// Declared options, in declaration order
    pub options: Vec<OptionDecl>,
}

impl Schema {
    /// Create a schema builder
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }
}

/// Schema builder
///
/// Provides a fluent API for declaring options.
pub struct SchemaBuilder {
    options: Vec<OptionDecl>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self { options: Vec::new() }
    }

    /// Declare an option
    pub fn option(
        mut self,
        key: &str,
        alias: &str,
        kind: OptionKind,
        default: Option<&str>,
    ) -> Self {
        self.options.push(OptionDecl {
            key: key.to_string(),
            alias: alias.to_string(),
            kind,
            default: default.map(|s| s.to_string()),
        });
        self
    }

    /// Build the schema
    pub fn build(self) -> Schema {
        Schema { options: self.options }
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

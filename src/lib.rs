//! Layerfig: layered, live-updatable configuration resolution engine
//!
//! For each declared configuration option (typed key/default pair), the
//! engine computes a single authoritative effective value from four
//! layered sources — a bypass value, an override value, a live
//! externally-supplied value, and a static default — and notifies
//! registered listeners whenever the effective value changes.
//!
//! Precedence is total: bypass > override > live > default. Override and
//! bypass rule sets are environment-scoped and only apply when the
//! process deployment environment matches.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use layerfig::{FigEngine, FigValue, MemorySource, OptionKind, PropertySource, Schema};
//!
//! fn main() -> layerfig::Result<()> {
//!     let source = Arc::new(MemorySource::new());
//!     source.set("svc.port", FigValue::Int(8345));
//!
//!     let schema = Schema::builder()
//!         .option("svc.port", "getPort", OptionKind::Int64, Some("8080"))
//!         .build();
//!
//!     let engine = FigEngine::new(&schema, source.clone() as Arc<dyn PropertySource>)?;
//!     assert_eq!(engine.get("svc.port")?, Some(FigValue::Int(8345)));
//!
//!     engine.set_override("svc.port", Some("9999"))?;
//!     assert_eq!(engine.get("svc.port")?, Some(FigValue::Int(9999)));
//!
//!     engine.set_override("svc.port", None)?;
//!     assert_eq!(engine.get("svc.port")?, Some(FigValue::Int(8345)));
//!     Ok(())
//! }
//! ```

// Public modules
pub mod common;
pub mod engine;
pub mod env;
pub mod rules;
pub mod schema;
pub mod source;

// Re-export commonly used structures and functions for convenience
pub use common::{init_logger, FigError, Result};
pub use engine::{ChangeEvent, FigEngine, ListenerId, OptionRegistry, OptionState};
pub use env::{deployment_env, set_deployment_env, Env};
pub use rules::{BypassSet, OverrideSet, RuleOption};
pub use schema::{FigValue, OptionDecl, OptionKind, Schema, SchemaBuilder};
pub use source::{Delivery, MemorySource, PropertySource, SourceCallback};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

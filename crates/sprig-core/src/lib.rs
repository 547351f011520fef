//! sprig-core - Engine and module loading for the sprig host.
//!
//! This crate provides the lower half of the sprig WebAssembly host:
//!
//! - [`SprigEngine`]: wrapper around the Wasmtime compilation engine
//! - [`ModuleLoader`]: decoding guest binaries and extracting metadata
//! - Configuration and error types shared with `sprig-host`
//!
//! Execution itself (instantiation, the write syscall, entry-point
//! invocation) lives in the `sprig-host` crate.
//!
//! # Quick Start
//!
//! ```
//! use sprig_core::prelude::*;
//! use std::sync::Arc;
//!
//! let engine = SprigEngine::default_engine().unwrap().into_shared();
//! let loader = ModuleLoader::new(Arc::clone(&engine));
//! let module = loader.load_wat(r#"(module (func (export "_start")))"#).unwrap();
//! assert!(module.has_entry_point());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod module;

// Re-export main types at crate root
pub use config::{EngineConfig, ResourceLimits};
pub use engine::{IntoShared, SharedEngine, SprigEngine};
pub use error::{EngineError, EngineResult, ModuleError, ModuleResult};
pub use module::{
    ENTRY_POINT, ExternInfo, ExternKind, ImportInfo, LoadedModule, MEMORY_EXPORT, ModuleLoader,
    ModuleMetadata,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{EngineConfig, ResourceLimits};
    pub use crate::engine::{IntoShared, SharedEngine, SprigEngine};
    pub use crate::error::{EngineError, ModuleError};
    pub use crate::module::{LoadedModule, ModuleLoader};
}

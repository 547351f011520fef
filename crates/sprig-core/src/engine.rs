//! Wasmtime engine wrapper.
//!
//! `SprigEngine` holds the compilation engine shared by module loading
//! and execution. One engine can serve any number of hosts and runs.

use std::sync::Arc;

use tracing::info;
use wasmtime::{Config, Engine};

use crate::config::EngineConfig;
use crate::error::EngineResult;

/// The compilation engine for sprig, wrapping Wasmtime's `Engine`.
///
/// # Example
///
/// ```
/// use sprig_core::{EngineConfig, SprigEngine};
///
/// let engine = SprigEngine::new(EngineConfig::default()).unwrap();
/// ```
pub struct SprigEngine {
    /// The underlying Wasmtime engine.
    inner: Engine,
    /// Configuration used to create this engine.
    config: EngineConfig,
}

impl SprigEngine {
    /// Create a new engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the Wasmtime engine cannot be created with
    /// the given configuration.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let mut wasmtime_config = Config::new();

        wasmtime_config.max_wasm_stack(config.max_wasm_stack);
        wasmtime_config.debug_info(config.debug_info);

        // Baseline feature set expected by the guest compiler target.
        wasmtime_config.wasm_bulk_memory(true);
        wasmtime_config.wasm_multi_value(true);

        let inner = Engine::new(&wasmtime_config)?;

        info!(
            max_wasm_stack = config.max_wasm_stack,
            debug_info = config.debug_info,
            "Created sprig engine"
        );

        Ok(Self { inner, config })
    }

    /// Create a new engine with default configuration.
    pub fn default_engine() -> EngineResult<Self> {
        Self::new(EngineConfig::default())
    }

    /// Get a reference to the underlying Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.inner
    }

    /// Get the configuration used to create this engine.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for SprigEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SprigEngine")
            .field("config", &self.config)
            .finish()
    }
}

/// A shared reference to a sprig engine.
pub type SharedEngine = Arc<SprigEngine>;

/// Extension trait for creating shared engines.
pub trait IntoShared {
    /// Convert into a shared engine reference.
    fn into_shared(self) -> SharedEngine;
}

impl IntoShared for SprigEngine {
    fn into_shared(self) -> SharedEngine {
        Arc::new(self)
    }
}

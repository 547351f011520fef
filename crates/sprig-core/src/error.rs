//! Core error types.
//!
//! Error kinds are split by the stage they can occur in: engine
//! construction and module decoding. Execution-stage errors live in
//! `sprig-host`, where the run actually happens.

use thiserror::Error;

/// Errors during engine creation and configuration.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid engine configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Underlying Wasmtime error.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),
}

/// Errors while decoding or reading a guest module.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The byte sequence is not a well-formed WebAssembly module.
    #[error("Invalid module: {0}")]
    Invalid(String),

    /// IO error reading the module.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying Wasmtime error.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for module operations.
pub type ModuleResult<T> = std::result::Result<T, ModuleError>;

//! Error types for the run host and the write emulation.

use thiserror::Error;

/// Errors raised while gathering a write request out of guest memory.
///
/// These never reach the caller directly: the host function that
/// invokes the emulation converts them into a trap, so a hostile
/// pointer/length pair ends the run the same way an out-of-bounds
/// load inside the guest would.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WriteError {
    /// A guest-supplied span falls outside linear memory.
    #[error("memory access out of bounds: offset={offset}, len={len}, memory_size={memory_size}")]
    OutOfBounds {
        /// The offset attempted.
        offset: usize,
        /// The length attempted.
        len: usize,
        /// The actual memory size.
        memory_size: usize,
    },

    /// The vector count exceeds the host's limit.
    #[error("too many I/O vectors: {count} (limit {max})")]
    TooManyVectors {
        /// The count the guest supplied.
        count: u32,
        /// The configured limit.
        max: u32,
    },
}

/// Information about a trap raised during guest execution.
#[derive(Debug, Clone)]
pub struct TrapInfo {
    /// Human-readable trap message.
    pub message: String,
}

impl std::fmt::Display for TrapInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TrapInfo {}

impl From<wasmtime::Trap> for TrapInfo {
    fn from(trap: wasmtime::Trap) -> Self {
        Self {
            message: trap.to_string(),
        }
    }
}

/// Errors surfaced by a single guest run.
///
/// The two user-visible classes are instantiation-stage failures and
/// runtime traps; both are terminal for the run. The caller must start
/// a fresh run to retry.
#[derive(Debug, Error)]
pub enum HostError {
    /// The binary failed to decode, its imports were unresolvable, or
    /// a resource limit was exceeded while building the instance.
    #[error("instantiation error: {0}")]
    Instantiation(#[source] wasmtime::Error),

    /// The module does not export the designated entry point.
    #[error("entry point '{0}' not exported by module")]
    MissingEntryPoint(String),

    /// The module does not export its linear memory, so the write
    /// syscall cannot be bound to anything.
    #[error("memory export '{0}' not found")]
    MemoryNotFound(String),

    /// Guest execution raised an unrecoverable fault.
    #[error("runtime error: {0}")]
    Trap(TrapInfo),
}

impl HostError {
    /// Whether this failure happened before the entry point could run.
    ///
    /// Instantiation-stage failures guarantee the entry point was
    /// never invoked; traps may leave partial output in the sink.
    pub fn is_instantiation_failure(&self) -> bool {
        !matches!(self, HostError::Trap(_))
    }
}

impl From<sprig_core::ModuleError> for HostError {
    fn from(err: sprig_core::ModuleError) -> Self {
        match err {
            sprig_core::ModuleError::Wasmtime(inner) => HostError::Instantiation(inner),
            other => HostError::Instantiation(wasmtime::Error::msg(other.to_string())),
        }
    }
}

/// Result type for run operations.
pub type HostResult<T> = std::result::Result<T, HostError>;

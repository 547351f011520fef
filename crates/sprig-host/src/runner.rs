//! Guest run lifecycle.
//!
//! A [`Host`] owns the pieces that outlive a single run: the engine,
//! the output sink, and the resource limits. Each call to
//! [`Host::load_and_run`] builds a fresh store, linker, and instance,
//! drives the guest's entry point to completion or trap, and drops the
//! instance. Nothing is shared between runs and no global state
//! exists, so multiple hosts can coexist in one process.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;
use wasmtime::{Caller, Linker, Store, StoreLimits, StoreLimitsBuilder};

use sprig_core::module::{ENTRY_POINT, MEMORY_EXPORT};
use sprig_core::{LoadedModule, ModuleLoader, ResourceLimits, SharedEngine};

use crate::error::{HostError, HostResult, TrapInfo};
use crate::sink::{OutputSink, StdoutSink};
use crate::wasi::{self, ERRNO_SUCCESS, IMPORT_MODULE, IMPORT_NAME, WriteRequest};

/// Unique identifier for one guest run, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// I/O accounting for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IoStats {
    /// Number of write syscalls the guest made.
    pub calls: u64,
    /// Total bytes gathered across all calls.
    pub bytes: u64,
}

/// Store data for one guest run.
///
/// This is the explicit per-instance context the syscall executes
/// against; the host function reaches it through the caller instead of
/// any process-wide state.
pub struct RunState {
    /// Identifier of this run.
    pub id: RunId,
    /// Destination for guest output.
    pub sink: Arc<dyn OutputSink>,
    /// Store resource limits.
    limits: StoreLimits,
    /// Write accounting.
    pub io: IoStats,
}

/// Configuration for a [`Host`].
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    /// Resource limits applied to each run's store.
    pub limits: ResourceLimits,
}

impl HostConfig {
    /// Create a configuration with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resource limits.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// The execution host for guest modules.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use sprig_core::{IntoShared, SprigEngine};
/// use sprig_host::{BufferSink, Host, OutputSink};
///
/// let engine = SprigEngine::default_engine().unwrap().into_shared();
/// let sink = Arc::new(BufferSink::new());
/// let host = Host::builder(engine)
///     .with_sink(Arc::clone(&sink) as Arc<dyn OutputSink>)
///     .build();
///
/// let wasm = wat::parse_str(r#"(module (func (export "_start")))"#).unwrap();
/// host.load_and_run(&wasm).unwrap();
/// assert!(sink.is_empty());
/// ```
pub struct Host {
    /// Shared engine reference.
    engine: SharedEngine,
    /// Host configuration.
    config: HostConfig,
    /// Destination for guest output.
    sink: Arc<dyn OutputSink>,
    /// Loader for guest binaries.
    loader: ModuleLoader,
}

impl Host {
    /// Create a builder for a host using the given engine.
    pub fn builder(engine: SharedEngine) -> HostBuilder {
        HostBuilder::new(engine)
    }

    /// Get a reference to the engine.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Get the module loader.
    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Load a guest binary and run it to completion.
    ///
    /// Decodes the bytes, instantiates the module against the write
    /// syscall import, and invokes the entry point. All guest output
    /// produced along the way, including output from instantiation-time
    /// initializers, is forwarded to the sink as it occurs; output
    /// appended before a trap is not rolled back.
    ///
    /// # Errors
    ///
    /// [`HostError::Instantiation`] if the binary is malformed, its
    /// imports cannot be resolved, or a resource limit is exceeded
    /// while building the instance; the entry point is never invoked in
    /// that case. [`HostError::Trap`] if the entry point (or a write
    /// call it makes with out-of-range vectors) raises an unrecoverable
    /// fault. Both are terminal for the run.
    pub fn load_and_run(&self, binary: &[u8]) -> HostResult<()> {
        let module = self.loader.load_bytes(binary)?;
        self.run_module(&module)
    }

    /// Run an already-loaded module.
    ///
    /// Same contract as [`Host::load_and_run`], minus the decode step.
    pub fn run_module(&self, module: &LoadedModule) -> HostResult<()> {
        let run_id = RunId::new();

        let limits = StoreLimitsBuilder::new()
            .memory_size(self.config.limits.max_memory_bytes)
            .memories(self.config.limits.max_memories as usize)
            .table_elements(self.config.limits.max_table_elements as usize)
            .instances(1)
            .build();

        let state = RunState {
            id: run_id,
            sink: Arc::clone(&self.sink),
            limits,
            io: IoStats::default(),
        };

        let mut store = Store::new(self.engine.inner(), state);
        store.limiter(|state| &mut state.limits);

        let mut linker: Linker<RunState> = Linker::new(self.engine.inner());
        register_fd_write(&mut linker).map_err(HostError::Instantiation)?;

        debug!(run_id = %run_id, module = ?module.name(), "Instantiating guest module");

        let instance = linker
            .instantiate(&mut store, module.inner())
            .map_err(HostError::Instantiation)?;

        // The syscall can only operate on an exported memory. Fail
        // before the entry point runs rather than on the first write.
        if module.requires_import(IMPORT_MODULE, IMPORT_NAME)
            && instance.get_memory(&mut store, MEMORY_EXPORT).is_none()
        {
            return Err(HostError::MemoryNotFound(MEMORY_EXPORT.to_string()));
        }

        let entry = instance
            .get_typed_func::<(), ()>(&mut store, ENTRY_POINT)
            .map_err(|_| HostError::MissingEntryPoint(ENTRY_POINT.to_string()))?;

        debug!(run_id = %run_id, "Invoking entry point");

        match entry.call(&mut store, ()) {
            Ok(()) => {
                let io = store.data().io;
                info!(
                    run_id = %run_id,
                    write_calls = io.calls,
                    bytes_written = io.bytes,
                    "Guest run completed"
                );
                Ok(())
            }
            Err(err) => {
                let trap = match err.downcast_ref::<wasmtime::Trap>() {
                    Some(trap) => TrapInfo::from(trap.clone()),
                    None => TrapInfo {
                        message: format!("{err:#}"),
                    },
                };
                warn!(run_id = %run_id, trap = %trap, "Guest run trapped");
                Err(HostError::Trap(trap))
            }
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").field("config", &self.config).finish()
    }
}

/// Register the write syscall as the instance's single host import.
fn register_fd_write(linker: &mut Linker<RunState>) -> Result<(), wasmtime::Error> {
    linker.func_wrap(
        IMPORT_MODULE,
        IMPORT_NAME,
        |mut caller: Caller<'_, RunState>,
         fd: u32,
         iovs_ptr: u32,
         iovs_len: u32,
         nwritten_ptr: u32|
         -> Result<u32, wasmtime::Error> {
            let memory = caller
                .get_export(MEMORY_EXPORT)
                .and_then(|e| e.into_memory())
                .ok_or_else(|| {
                    wasmtime::Error::msg(format!("memory export '{MEMORY_EXPORT}' not found"))
                })?;

            let request = WriteRequest {
                fd,
                iovs_ptr,
                iovs_len,
                nwritten_ptr,
            };

            let (data, state) = memory.data_and_store_mut(&mut caller);
            // A bounds violation escalates to a trap through this
            // error return; it is never reported as a short write.
            let written = wasi::emulate_write(data, state.sink.as_ref(), &request)
                .map_err(wasmtime::Error::new)?;

            state.io.calls += 1;
            state.io.bytes += u64::from(written);

            Ok(ERRNO_SUCCESS)
        },
    )?;
    Ok(())
}

/// Builder for creating hosts.
pub struct HostBuilder {
    engine: SharedEngine,
    config: HostConfig,
    sink: Option<Arc<dyn OutputSink>>,
}

impl HostBuilder {
    /// Create a new host builder.
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            config: HostConfig::default(),
            sink: None,
        }
    }

    /// Set the host configuration.
    pub fn with_config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the resource limits.
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Set the output sink.
    ///
    /// Defaults to [`StdoutSink`] when not set.
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the host.
    pub fn build(self) -> Host {
        let sink = self.sink.unwrap_or_else(|| Arc::new(StdoutSink));
        let loader = ModuleLoader::new(Arc::clone(&self.engine));
        Host {
            engine: self.engine,
            config: self.config,
            sink,
            loader,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufferSink;
    use sprig_core::{IntoShared, SprigEngine};

    fn test_host() -> (Host, Arc<BufferSink>) {
        let engine = SprigEngine::default_engine().unwrap().into_shared();
        let sink = Arc::new(BufferSink::new());
        let host = Host::builder(engine)
            .with_sink(Arc::clone(&sink) as Arc<dyn OutputSink>)
            .build();
        (host, sink)
    }

    fn wasm(wat_source: &str) -> Vec<u8> {
        wat::parse_str(wat_source).unwrap()
    }

    const HELLO: &str = r#"
        (module
            (import "wasi_unstable" "fd_write"
                (func $fd_write (param i32 i32 i32 i32) (result i32)))
            (memory (export "memory") 1)
            (data (i32.const 100) "Hi!\n")
            (func (export "_start")
                (i32.store (i32.const 8) (i32.const 100))
                (i32.store (i32.const 12) (i32.const 4))
                (call $fd_write (i32.const 1) (i32.const 8) (i32.const 1) (i32.const 20))
                drop))
    "#;

    #[test]
    fn test_hello_run() {
        let (host, sink) = test_host();

        host.load_and_run(&wasm(HELLO)).unwrap();

        assert_eq!(sink.contents(), "Hi!\r");
    }

    #[test]
    fn test_nwritten_reported_back_to_guest() {
        let (host, sink) = test_host();

        // The guest checks that fd_write stored 4 at the out-pointer
        // and traps otherwise.
        let source = r#"
            (module
                (import "wasi_unstable" "fd_write"
                    (func $fd_write (param i32 i32 i32 i32) (result i32)))
                (memory (export "memory") 1)
                (data (i32.const 100) "ok!\n")
                (func (export "_start")
                    (i32.store (i32.const 8) (i32.const 100))
                    (i32.store (i32.const 12) (i32.const 4))
                    (call $fd_write (i32.const 1) (i32.const 8) (i32.const 1) (i32.const 20))
                    drop
                    (if (i32.ne (i32.load (i32.const 20)) (i32.const 4))
                        (then unreachable))))
        "#;

        host.load_and_run(&wasm(source)).unwrap();

        assert_eq!(sink.contents(), "ok!\r");
    }

    #[test]
    fn test_write_during_start_section_is_forwarded() {
        let (host, sink) = test_host();

        let source = r#"
            (module
                (import "wasi_unstable" "fd_write"
                    (func $fd_write (param i32 i32 i32 i32) (result i32)))
                (memory (export "memory") 1)
                (data (i32.const 100) "init\n")
                (func $init
                    (i32.store (i32.const 8) (i32.const 100))
                    (i32.store (i32.const 12) (i32.const 5))
                    (call $fd_write (i32.const 1) (i32.const 8) (i32.const 1) (i32.const 20))
                    drop)
                (start $init)
                (func (export "_start")))
        "#;

        host.load_and_run(&wasm(source)).unwrap();

        assert_eq!(sink.contents(), "init\r");
    }

    #[test]
    fn test_corrupt_binary_is_instantiation_error() {
        let (host, sink) = test_host();

        let err = host.load_and_run(&[0, 1, 2, 3]).unwrap_err();

        assert!(err.is_instantiation_failure());
        assert!(matches!(err, HostError::Instantiation(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_unresolvable_import_is_instantiation_error() {
        let (host, sink) = test_host();

        let source = r#"
            (module
                (import "env" "mystery" (func))
                (func (export "_start")))
        "#;

        let err = host.load_and_run(&wasm(source)).unwrap_err();

        assert!(matches!(err, HostError::Instantiation(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_trap_in_entry_point() {
        let (host, sink) = test_host();

        let source = r#"(module (func (export "_start") unreachable))"#;

        let err = host.load_and_run(&wasm(source)).unwrap_err();

        assert!(matches!(err, HostError::Trap(_)));
        assert!(!err.is_instantiation_failure());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_out_of_bounds_vector_traps_and_keeps_prior_output() {
        let (host, sink) = test_host();

        // First write succeeds, second points its buffer outside
        // linear memory.
        let source = r#"
            (module
                (import "wasi_unstable" "fd_write"
                    (func $fd_write (param i32 i32 i32 i32) (result i32)))
                (memory (export "memory") 1)
                (data (i32.const 100) "early\n")
                (func (export "_start")
                    (i32.store (i32.const 8) (i32.const 100))
                    (i32.store (i32.const 12) (i32.const 6))
                    (call $fd_write (i32.const 1) (i32.const 8) (i32.const 1) (i32.const 20))
                    drop
                    (i32.store (i32.const 8) (i32.const 2000000))
                    (i32.store (i32.const 12) (i32.const 16))
                    (call $fd_write (i32.const 1) (i32.const 8) (i32.const 1) (i32.const 20))
                    drop))
        "#;

        let err = host.load_and_run(&wasm(source)).unwrap_err();

        assert!(matches!(err, HostError::Trap(_)));
        assert_eq!(sink.contents(), "early\r");
    }

    #[test]
    fn test_missing_entry_point() {
        let (host, _sink) = test_host();

        let source = r#"(module (func (export "main")))"#;

        let err = host.load_and_run(&wasm(source)).unwrap_err();

        assert!(matches!(err, HostError::MissingEntryPoint(_)));
    }

    #[test]
    fn test_missing_memory_export() {
        let (host, sink) = test_host();

        let source = r#"
            (module
                (import "wasi_unstable" "fd_write"
                    (func $fd_write (param i32 i32 i32 i32) (result i32)))
                (func (export "_start")
                    (call $fd_write (i32.const 1) (i32.const 0) (i32.const 0) (i32.const 0))
                    drop))
        "#;

        let err = host.load_and_run(&wasm(source)).unwrap_err();

        assert!(matches!(err, HostError::MemoryNotFound(_)));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_zero_vector_write_succeeds() {
        let (host, sink) = test_host();

        let source = r#"
            (module
                (import "wasi_unstable" "fd_write"
                    (func $fd_write (param i32 i32 i32 i32) (result i32)))
                (memory (export "memory") 1)
                (func (export "_start")
                    (call $fd_write (i32.const 1) (i32.const 8) (i32.const 0) (i32.const 20))
                    drop))
        "#;

        host.load_and_run(&wasm(source)).unwrap();

        assert!(sink.is_empty());
    }

    #[test]
    fn test_fresh_instance_per_run() {
        let (host, sink) = test_host();
        let binary = wasm(HELLO);

        host.load_and_run(&binary).unwrap();
        host.load_and_run(&binary).unwrap();

        assert_eq!(sink.contents(), "Hi!\rHi!\r");
    }

    #[test]
    fn test_two_hosts_coexist() {
        let engine = SprigEngine::default_engine().unwrap().into_shared();
        let sink_a = Arc::new(BufferSink::new());
        let sink_b = Arc::new(BufferSink::new());
        let host_a = Host::builder(Arc::clone(&engine))
            .with_sink(Arc::clone(&sink_a) as Arc<dyn OutputSink>)
            .build();
        let host_b = Host::builder(engine)
            .with_sink(Arc::clone(&sink_b) as Arc<dyn OutputSink>)
            .build();

        let binary = wasm(HELLO);
        host_a.load_and_run(&binary).unwrap();
        host_b.load_and_run(&binary).unwrap();

        assert_eq!(sink_a.contents(), "Hi!\r");
        assert_eq!(sink_b.contents(), "Hi!\r");
    }
}

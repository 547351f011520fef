//! sprig-host - Run host and write-syscall emulation.
//!
//! This crate provides the upper half of the sprig WebAssembly host:
//!
//! - [`Host`]: one-shot guest execution (`load_and_run`)
//! - [`wasi::emulate_write`]: the `fd_write` polyfill over linear memory
//! - [`OutputSink`]: the seam to the presentation surface
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sprig_core::{IntoShared, SprigEngine};
//! use sprig_host::{BufferSink, Host, OutputSink};
//!
//! let engine = SprigEngine::default_engine().unwrap().into_shared();
//! let sink = Arc::new(BufferSink::new());
//! let host = Host::builder(engine)
//!     .with_sink(Arc::clone(&sink) as Arc<dyn OutputSink>)
//!     .build();
//!
//! let wasm = wat::parse_str(
//!     r#"
//!     (module
//!         (import "wasi_unstable" "fd_write"
//!             (func $fd_write (param i32 i32 i32 i32) (result i32)))
//!         (memory (export "memory") 1)
//!         (data (i32.const 100) "hello\n")
//!         (func (export "_start")
//!             (i32.store (i32.const 8) (i32.const 100))
//!             (i32.store (i32.const 12) (i32.const 6))
//!             (call $fd_write (i32.const 1) (i32.const 8) (i32.const 1) (i32.const 20))
//!             drop))
//!     "#,
//! )
//! .unwrap();
//!
//! host.load_and_run(&wasm).unwrap();
//! assert_eq!(sink.contents(), "hello\r");
//! ```

pub mod error;
pub mod runner;
pub mod sink;
pub mod wasi;

// Re-export main types
pub use error::{HostError, HostResult, TrapInfo, WriteError};
pub use runner::{Host, HostBuilder, HostConfig, IoStats, RunId, RunState};
pub use sink::{BufferSink, OutputSink, StdoutSink};
pub use wasi::{ERRNO_SUCCESS, IMPORT_MODULE, IMPORT_NAME, MAX_IOVS, WriteRequest};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{HostError, HostResult, TrapInfo, WriteError};
    pub use crate::runner::{Host, HostBuilder, HostConfig};
    pub use crate::sink::{BufferSink, OutputSink, StdoutSink};
}

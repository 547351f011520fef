//! Guest module loading.
//!
//! The host treats a guest binary as opaque: it is decoded once by
//! Wasmtime and never inspected beyond the import/export surface
//! needed to bind the syscall and find the entry point. Metadata is
//! extracted at load time so the CLI can report on a module without
//! instantiating it.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};
use wasmtime::{ExternType, Module};

use crate::engine::SprigEngine;
use crate::error::{ModuleError, ModuleResult};

/// Name of the exported entry point the host invokes.
pub const ENTRY_POINT: &str = "_start";

/// Name of the exported linear memory the syscall reads and writes.
pub const MEMORY_EXPORT: &str = "memory";

/// A decoded guest module ready for instantiation.
#[derive(Clone)]
pub struct LoadedModule {
    /// The underlying Wasmtime module.
    inner: Module,
    /// Metadata extracted at load time.
    metadata: ModuleMetadata,
}

impl LoadedModule {
    /// Get a reference to the underlying Wasmtime module.
    pub fn inner(&self) -> &Module {
        &self.inner
    }

    /// Get the module metadata.
    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    /// Get the module name, if set.
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// Check if the module has a specific export.
    pub fn has_export(&self, name: &str) -> bool {
        self.metadata.exports.iter().any(|e| e.name == name)
    }

    /// Check if the module exports the designated entry point.
    pub fn has_entry_point(&self) -> bool {
        self.metadata
            .exports
            .iter()
            .any(|e| e.name == ENTRY_POINT && e.kind == ExternKind::Function)
    }

    /// Check if the module exports its linear memory.
    pub fn exports_memory(&self) -> bool {
        self.metadata
            .exports
            .iter()
            .any(|e| e.name == MEMORY_EXPORT && e.kind == ExternKind::Memory)
    }

    /// Check if the module requires a specific import.
    pub fn requires_import(&self, module: &str, name: &str) -> bool {
        self.metadata
            .imports
            .iter()
            .any(|i| i.module == module && i.name == name)
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.metadata.name)
            .field("exports", &self.metadata.exports.len())
            .field("imports", &self.metadata.imports.len())
            .finish()
    }
}

/// Metadata extracted from a guest module.
#[derive(Debug, Clone, Default)]
pub struct ModuleMetadata {
    /// Module name, if specified.
    pub name: Option<String>,
    /// Exported items.
    pub exports: Vec<ExternInfo>,
    /// Required imports.
    pub imports: Vec<ImportInfo>,
}

/// An exported item.
#[derive(Debug, Clone)]
pub struct ExternInfo {
    /// Export name.
    pub name: String,
    /// Kind of the export.
    pub kind: ExternKind,
}

/// A required import.
#[derive(Debug, Clone)]
pub struct ImportInfo {
    /// Import module (namespace) name.
    pub module: String,
    /// Import name.
    pub name: String,
    /// Kind of the import.
    pub kind: ExternKind,
}

/// The kind of an imported or exported item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternKind {
    /// A function.
    Function,
    /// A linear memory.
    Memory,
    /// A global.
    Global,
    /// A table.
    Table,
}

impl ExternKind {
    /// Get the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternKind::Function => "function",
            ExternKind::Memory => "memory",
            ExternKind::Global => "global",
            ExternKind::Table => "table",
        }
    }
}

impl From<ExternType> for ExternKind {
    fn from(ty: ExternType) -> Self {
        match ty {
            ExternType::Func(_) => ExternKind::Function,
            ExternType::Memory(_) => ExternKind::Memory,
            ExternType::Global(_) => ExternKind::Global,
            ExternType::Table(_) => ExternKind::Table,
        }
    }
}

/// Loader for guest modules.
pub struct ModuleLoader {
    /// Engine used for compilation.
    engine: Arc<SprigEngine>,
}

impl ModuleLoader {
    /// Create a new module loader with the given engine.
    pub fn new(engine: Arc<SprigEngine>) -> Self {
        Self { engine }
    }

    /// Load a module from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a well-formed module.
    pub fn load_bytes(&self, bytes: &[u8]) -> ModuleResult<LoadedModule> {
        debug!(size = bytes.len(), "Loading guest module from bytes");

        let module = Module::new(self.engine.inner(), bytes)?;
        let metadata = extract_metadata(&module);

        info!(
            name = ?metadata.name,
            exports = metadata.exports.len(),
            imports = metadata.imports.len(),
            "Loaded guest module"
        );

        Ok(LoadedModule {
            inner: module,
            metadata,
        })
    }

    /// Load a module from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not contain
    /// a well-formed module.
    pub fn load_file(&self, path: &Path) -> ModuleResult<LoadedModule> {
        debug!(path = %path.display(), "Loading guest module from file");

        let bytes = std::fs::read(path)?;
        self.load_bytes(&bytes)
    }

    /// Load a module from WAT (WebAssembly Text) format.
    ///
    /// Useful for testing and for running compiler output that has not
    /// been assembled to binary yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the WAT is invalid.
    pub fn load_wat(&self, source: &str) -> ModuleResult<LoadedModule> {
        let bytes = wat::parse_str(source).map_err(|e| ModuleError::Invalid(e.to_string()))?;
        self.load_bytes(&bytes)
    }
}

fn extract_metadata(module: &Module) -> ModuleMetadata {
    let name = module.name().map(String::from);

    let exports = module
        .exports()
        .map(|export| ExternInfo {
            name: export.name().to_string(),
            kind: export.ty().into(),
        })
        .collect();

    let imports = module
        .imports()
        .map(|import| ImportInfo {
            module: import.module().to_string(),
            name: import.name().to_string(),
            kind: import.ty().into(),
        })
        .collect();

    ModuleMetadata {
        name,
        exports,
        imports,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn create_loader() -> ModuleLoader {
        let engine = Arc::new(SprigEngine::new(EngineConfig::default()).unwrap());
        ModuleLoader::new(engine)
    }

    #[test]
    fn test_load_guest_shaped_module() {
        let loader = create_loader();

        let module = loader
            .load_wat(
                r#"
            (module
                (import "wasi_unstable" "fd_write"
                    (func $fd_write (param i32 i32 i32 i32) (result i32)))
                (memory (export "memory") 1)
                (func (export "_start"))
            )
        "#,
            )
            .unwrap();

        assert!(module.has_entry_point());
        assert!(module.exports_memory());
        assert!(module.requires_import("wasi_unstable", "fd_write"));
    }

    #[test]
    fn test_metadata_kinds() {
        let loader = create_loader();

        let module = loader
            .load_wat(
                r#"
            (module
                (memory (export "memory") 1)
                (func (export "run"))
            )
        "#,
            )
            .unwrap();

        assert!(!module.has_entry_point());
        assert_eq!(module.metadata().exports.len(), 2);

        let mem = module
            .metadata()
            .exports
            .iter()
            .find(|e| e.name == "memory")
            .unwrap();
        assert_eq!(mem.kind, ExternKind::Memory);
    }

    #[test]
    fn test_load_invalid_bytes() {
        let loader = create_loader();

        let result = loader.load_bytes(&[0, 1, 2, 3]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_truncated_module() {
        let loader = create_loader();

        let valid = wat::parse_str(r#"(module (func (export "_start")))"#).unwrap();
        let result = loader.load_bytes(&valid[..valid.len() / 2]);
        assert!(result.is_err());
    }
}

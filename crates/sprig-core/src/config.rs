//! Configuration types for the sprig host.

/// Configuration for the underlying Wasmtime engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum WASM stack size in bytes.
    ///
    /// Defaults to 1MB.
    pub max_wasm_stack: usize,

    /// Enable debug information in compiled code.
    ///
    /// Increases compilation time but improves trap messages.
    pub debug_info: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_wasm_stack: 1024 * 1024, // 1MB
            debug_info: false,
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum WASM stack size.
    pub fn with_max_wasm_stack(mut self, bytes: usize) -> Self {
        self.max_wasm_stack = bytes;
        self
    }

    /// Enable debug information.
    pub fn with_debug_info(mut self, enabled: bool) -> Self {
        self.debug_info = enabled;
        self
    }
}

/// Resource limits applied to a guest instance's store.
///
/// A guest that tries to grow past these limits fails at the point of
/// the allocation, which surfaces as an instantiation failure or a
/// trap depending on when the growth happens.
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Maximum linear memory in bytes.
    ///
    /// Defaults to 64MB.
    pub max_memory_bytes: usize,

    /// Maximum number of memory instances.
    pub max_memories: u32,

    /// Maximum table elements.
    pub max_table_elements: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 64 * 1024 * 1024, // 64MB
            max_memories: 1,
            max_table_elements: 10_000,
        }
    }
}

impl ResourceLimits {
    /// Create resource limits with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum linear memory limit.
    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    /// Create tight limits for testing.
    pub fn minimal() -> Self {
        Self {
            max_memory_bytes: 1024 * 1024, // 1MB
            max_memories: 1,
            max_table_elements: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_wasm_stack, 1024 * 1024);
        assert!(!config.debug_info);
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::new()
            .with_max_wasm_stack(2 * 1024 * 1024)
            .with_debug_info(true);

        assert_eq!(config.max_wasm_stack, 2 * 1024 * 1024);
        assert!(config.debug_info);
    }

    #[test]
    fn test_resource_limits_presets() {
        let minimal = ResourceLimits::minimal();
        let standard = ResourceLimits::default();

        assert!(minimal.max_memory_bytes < standard.max_memory_bytes);
        assert_eq!(standard.max_memories, 1);
    }
}

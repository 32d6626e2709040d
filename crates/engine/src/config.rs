//! VM configuration

use serde::{Deserialize, Serialize};

/// Default nominal heap capacity (entries)
pub const DEFAULT_HEAP_SIZE: usize = 16_384;

/// Configuration for a [`crate::Vm`]
///
/// # Example
///
/// ```
/// use lamina_engine::VmConfig;
///
/// let config = VmConfig::new().heap_size(1024);
/// assert_eq!(config.heap_size, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    /// Nominal heap capacity; a reporting hint, not an enforced limit
    #[serde(default = "default_heap_size")]
    pub heap_size: usize,
}

fn default_heap_size() -> usize {
    DEFAULT_HEAP_SIZE
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            heap_size: DEFAULT_HEAP_SIZE,
        }
    }
}

impl VmConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the nominal heap capacity
    pub fn heap_size(mut self, size: usize) -> Self {
        self.heap_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VmConfig::default();
        assert_eq!(config.heap_size, DEFAULT_HEAP_SIZE);
    }

    #[test]
    fn test_builder_setters() {
        let config = VmConfig::new().heap_size(128);
        assert_eq!(config.heap_size, 128);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = VmConfig::new().heap_size(512);
        let json = serde_json::to_string(&config).unwrap();
        let restored: VmConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_missing_field_uses_default() {
        let restored: VmConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(restored.heap_size, DEFAULT_HEAP_SIZE);
    }
}

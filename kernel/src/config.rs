//! Simulator Configuration
//!
//! Persisted page size and total memory, stored as a small JSON document.

use crate::{KernelError, KernelResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Default page size (KB)
pub const DEFAULT_PAGE_SIZE_KB: u32 = 64;

/// Default total memory (KB)
pub const DEFAULT_TOTAL_MEMORY_KB: u32 = 1024;

/// Memory configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Page (and frame) size in KB
    pub page_size_kb: u32,

    /// Size of the simulated physical memory in KB
    pub total_memory_kb: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            page_size_kb: DEFAULT_PAGE_SIZE_KB,
            total_memory_kb: DEFAULT_TOTAL_MEMORY_KB,
        }
    }
}

impl SimConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> KernelResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KernelError::Config(format!("{}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| KernelError::Config(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration, writing the defaults first if the file is absent
    pub fn load_or_init(path: &Path) -> KernelResult<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }

        Self::load(path)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> KernelResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| KernelError::Config(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| KernelError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> KernelResult<()> {
        if self.page_size_kb == 0 {
            return Err(KernelError::Config("page_size_kb must be positive".into()));
        }

        if self.total_memory_kb == 0 {
            return Err(KernelError::Config("total_memory_kb must be positive".into()));
        }

        if self.page_size_kb > self.total_memory_kb {
            return Err(KernelError::Config(format!(
                "page size {} KB exceeds total memory {} KB",
                self.page_size_kb, self.total_memory_kb
            )));
        }

        Ok(())
    }

    /// Number of frames in the pool
    pub fn total_frames(&self) -> usize {
        (self.total_memory_kb / self.page_size_kb) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.page_size_kb, 64);
        assert_eq!(config.total_memory_kb, 1024);
        assert_eq!(config.total_frames(), 16);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");

        let config = SimConfig { page_size_kb: 32, total_memory_kb: 512 };
        config.save(&path).unwrap();

        let loaded = SimConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_init_writes_defaults() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        assert!(!path.exists());

        let config = SimConfig::load_or_init(&path).unwrap();
        assert_eq!(config, SimConfig::default());
        assert!(path.exists());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"page_size_kb\": 64"));
    }

    #[test]
    fn test_validate_rejects_zero_page() {
        let config = SimConfig { page_size_kb: 0, total_memory_kb: 1024 };
        assert!(matches!(config.validate(), Err(KernelError::Config(_))));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(SimConfig::load(&path).is_err());
    }
}

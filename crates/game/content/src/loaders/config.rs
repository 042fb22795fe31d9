//! Modifier configuration loader.

use std::path::Path;

use netmod_core::ModConfig;

use crate::loaders::{LoadResult, read_file};

/// Loader for [`ModConfig`] from TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config data from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> LoadResult<ModConfig> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> LoadResult<ModConfig> {
        let config: ModConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?;

        if config.tick_rate == 0 {
            anyhow::bail!("tick_rate must be at least 1");
        }
        Ok(config)
    }
}

//! Content factory for building a registry and config from a data directory.

use std::path::{Path, PathBuf};

use netmod_core::{ModConfig, ModRegistry};

use crate::loaders::{CatalogLoader, ConfigLoader, LoadResult, ModCatalog};

/// Content factory that loads all modifier content from a data directory.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── config.toml
/// └── mods.ron
/// ```
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Factory over the data shipped with this crate.
    pub fn builtin() -> Self {
        Self::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("data"))
    }

    /// Load configuration from `config.toml`.
    pub fn load_config(&self) -> LoadResult<ModConfig> {
        ConfigLoader::load(&self.data_dir.join("config.toml"))
    }

    /// Load the mod catalog from `mods.ron`.
    pub fn load_catalog(&self) -> LoadResult<ModCatalog> {
        CatalogLoader::load(&self.data_dir.join("mods.ron"))
    }

    /// Load `mods.ron` and register every entry.
    pub fn load_registry(&self) -> LoadResult<ModRegistry> {
        self.load_catalog()?.build_registry()
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_paths() {
        let factory = ContentFactory::new("/tmp/data");
        assert_eq!(factory.data_dir(), Path::new("/tmp/data"));
    }

    #[test]
    fn builtin_data_loads() {
        let factory = ContentFactory::builtin();
        assert_eq!(factory.load_config().unwrap().tick_rate, 60);
        assert!(factory.load_registry().unwrap().len() >= 3);
    }

    #[test]
    fn loads_from_temporary_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "tick_rate = 20\n").unwrap();
        std::fs::write(
            dir.path().join("mods.ron"),
            r#"(mods: [Motion(name: "drift")])"#,
        )
        .unwrap();

        let factory = ContentFactory::new(dir.path());
        assert_eq!(factory.load_config().unwrap().tick_rate, 20);

        let registry = factory.load_registry().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.index_of("drift").is_some());
    }
}

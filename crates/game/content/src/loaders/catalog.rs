//! Mod catalog loader.
//!
//! A catalog lists behavior definitions in registration order. The position of
//! an entry is the behavior index peers exchange on the wire, so catalogs are
//! append-only between protocol versions.

use std::path::Path;
use std::sync::Arc;

use netmod_core::{
    DataOverride, EmitterMod, ModBehavior, ModRegistry, MotionMod, StatKind, StatModifierMod,
    TargetKinds, UpgradableMod, UpgradeLevel, UpgradeTable,
};
use serde::{Deserialize, Serialize};

use crate::loaders::{LoadResult, read_file};

/// One behavior definition as written in a catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModSpec {
    StatModifier {
        name: String,
        stat: StatKind,
        contribution: DataOverride<f32>,
        #[serde(default)]
        duration_ticks: u32,
        #[serde(default)]
        targets: Option<TargetKinds>,
    },
    Upgradable {
        name: String,
        stat: StatKind,
        levels: Vec<UpgradeLevel>,
        #[serde(default = "first_level")]
        initial_level: Option<u8>,
        #[serde(default)]
        targets: Option<TargetKinds>,
    },
    Motion {
        name: String,
        #[serde(default)]
        targets: Option<TargetKinds>,
    },
    Emitter {
        name: String,
        projectile_prefab: u8,
        interval_ticks: u16,
        speed: f32,
        #[serde(default)]
        shots: u16,
        #[serde(default)]
        targets: Option<TargetKinds>,
    },
}

fn first_level() -> Option<u8> {
    Some(0)
}

impl ModSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::StatModifier { name, .. }
            | Self::Upgradable { name, .. }
            | Self::Motion { name, .. }
            | Self::Emitter { name, .. } => name,
        }
    }

    /// Instantiates the behavior this entry describes.
    pub fn build(&self) -> LoadResult<Arc<dyn ModBehavior>> {
        let behavior: Arc<dyn ModBehavior> = match self {
            Self::StatModifier {
                name,
                stat,
                contribution,
                duration_ticks,
                targets,
            } => {
                if !contribution.data.is_finite() {
                    anyhow::bail!("Mod '{}' has a non-finite contribution", name);
                }
                let behavior = StatModifierMod::new(name.clone(), *stat, contribution.clone())
                    .with_duration(*duration_ticks);
                Arc::new(match targets {
                    Some(targets) => behavior.with_targets(*targets),
                    None => behavior,
                })
            }
            Self::Upgradable {
                name,
                stat,
                levels,
                initial_level,
                targets,
            } => {
                let table = UpgradeTable::new(levels.iter().cloned())
                    .map_err(|e| anyhow::anyhow!("Invalid upgrade table for mod '{}': {}", name, e))?;
                let behavior = UpgradableMod::new(name.clone(), *stat, table)
                    .with_initial_level(*initial_level);
                Arc::new(match targets {
                    Some(targets) => behavior.with_targets(*targets),
                    None => behavior,
                })
            }
            Self::Motion { name, targets } => {
                let behavior = MotionMod::new(name.clone());
                Arc::new(match targets {
                    Some(targets) => behavior.with_targets(*targets),
                    None => behavior,
                })
            }
            Self::Emitter {
                name,
                projectile_prefab,
                interval_ticks,
                speed,
                shots,
                targets,
            } => {
                if *interval_ticks == 0 {
                    anyhow::bail!("Emitter '{}' needs a non-zero interval", name);
                }
                let behavior = EmitterMod::new(name.clone(), *projectile_prefab, *interval_ticks, *speed)
                    .with_shots(*shots);
                Arc::new(match targets {
                    Some(targets) => behavior.with_targets(*targets),
                    None => behavior,
                })
            }
        };
        Ok(behavior)
    }
}

/// Catalog structure for RON files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModCatalog {
    pub mods: Vec<ModSpec>,
}

impl ModCatalog {
    /// Registers every entry in order.
    ///
    /// Fails on duplicate names: a second entry would silently alias the
    /// first index and shift every later one.
    pub fn build_registry(&self) -> LoadResult<ModRegistry> {
        let mut registry = ModRegistry::new();
        for spec in &self.mods {
            if registry.index_of(spec.name()).is_some() {
                anyhow::bail!("Duplicate mod name '{}' in catalog", spec.name());
            }
            registry
                .register(spec.build()?)
                .map_err(|e| anyhow::anyhow!("Failed to register mod '{}': {}", spec.name(), e))?;
        }
        Ok(registry)
    }
}

/// Loader for mod catalogs from RON files.
pub struct CatalogLoader;

impl CatalogLoader {
    /// Load a mod catalog from a RON file.
    pub fn load(path: &Path) -> LoadResult<ModCatalog> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    /// Parse a mod catalog from RON text.
    pub fn parse(content: &str) -> LoadResult<ModCatalog> {
        ron::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse mod catalog RON: {}", e))
    }

    /// The catalog shipped with this crate.
    pub fn builtin() -> LoadResult<ModCatalog> {
        Self::parse(include_str!("../../data/mods.ron"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use netmod_core::{BehaviorIndex, StackingType};

    use super::*;

    #[test]
    fn builtin_catalog_builds_in_order() {
        let catalog = CatalogLoader::builtin().expect("builtin catalog parses");
        let registry = catalog.build_registry().expect("builtin catalog registers");

        assert_eq!(registry.len(), catalog.mods.len());
        assert_eq!(registry.index_of("quick_reload"), Some(BehaviorIndex(2)));

        let upgrade = registry.resolve(BehaviorIndex(1)).unwrap();
        assert_eq!(upgrade.name(), "reload_upgrade");
        assert_eq!(
            upgrade.valid_targets(),
            TargetKinds::VEHICLE | TargetKinds::CHARACTER
        );
    }

    #[test]
    fn loads_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"(
                mods: [
                    StatModifier(
                        name: "armor",
                        stat: max_health,
                        contribution: (priority: 1, stacking: add, data: 25.0),
                    ),
                ],
            )"#
        )
        .unwrap();

        let catalog = CatalogLoader::load(file.path()).unwrap();
        match &catalog.mods[0] {
            ModSpec::StatModifier {
                stat,
                contribution,
                duration_ticks,
                targets,
                ..
            } => {
                assert_eq!(*stat, StatKind::MaxHealth);
                assert_eq!(contribution.stacking, StackingType::Add);
                assert_eq!(*duration_ticks, 0);
                assert!(targets.is_none());
            }
            other => panic!("unexpected spec {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let catalog = ModCatalog {
            mods: vec![
                ModSpec::Motion {
                    name: "thrust".into(),
                    targets: None,
                },
                ModSpec::Motion {
                    name: "thrust".into(),
                    targets: None,
                },
            ],
        };
        let err = catalog.build_registry().unwrap_err();
        assert!(err.to_string().contains("Duplicate mod name 'thrust'"));
    }

    #[test]
    fn empty_upgrade_table_is_rejected() {
        let spec = ModSpec::Upgradable {
            name: "broken".into(),
            stat: StatKind::Damage,
            levels: Vec::new(),
            initial_level: Some(0),
            targets: None,
        };
        assert!(spec.build().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CatalogLoader::load(&dir.path().join("missing.ron")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }
}

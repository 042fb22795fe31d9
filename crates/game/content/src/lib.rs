//! Data-driven modifier content and loaders.
//!
//! This crate provides loaders for RON/TOML data files:
//! - Mod catalogs (RON): behavior definitions in registration order
//! - Modifier configuration (TOML): tick rate
//!
//! Content is consumed once at startup to build the [`ModRegistry`](netmod_core::ModRegistry)
//! shared by the runtime and never appears in replicated records.

#[cfg(feature = "loaders")]
pub mod loaders;

#[cfg(feature = "loaders")]
pub use loaders::{CatalogLoader, ConfigLoader, ContentFactory, LoadResult, ModCatalog, ModSpec};

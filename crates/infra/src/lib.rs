//! Infrastructure layer: catalog storage, the engine registry service, config.

pub mod catalog_store;
pub mod config;
pub mod registry;

pub use catalog_store::{
    CatalogStore, CatalogStoreError, InMemoryCatalogStore, PostgresCatalogStore,
};
pub use config::{DatabaseConfig, RegistryConfig};
pub use registry::{ModuleRegistry, RegistryError};

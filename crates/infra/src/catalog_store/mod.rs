//! Tenant-scoped module catalog storage.
//!
//! This module defines the storage boundary the registry depends on, without
//! making any backend assumptions, plus in-memory and Postgres implementations.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryCatalogStore;
pub use postgres::PostgresCatalogStore;
pub use r#trait::{CatalogStore, CatalogStoreError};

use std::sync::Arc;

use thiserror::Error;

use opsconsole_core::{ExpectedVersion, TenantId};
use opsconsole_engines::{Module, ModuleDefinition, ModuleKey, ModulePatch};

/// Catalog store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed
/// to registry rule failures, which live in `RegistryError`.
#[derive(Debug, Error)]
pub enum CatalogStoreError {
    /// No record exists for `(tenant, key)`.
    #[error("module record not found: {0}")]
    NotFound(ModuleKey),

    /// Compare-and-swap on `revision` failed.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// Backend failure (connection, decoding, lock poisoning, ...).
    #[error("catalog backend failure: {0}")]
    Backend(String),
}

/// Durable per-tenant module records, addressable by `(tenant, key)`.
///
/// ## Implementation Requirements
///
/// - every read and write is scoped by `tenant_id`
/// - `fetch_all` orders by `sort_order`, then `title`
/// - `update` is a compare-and-swap against `revision` and bumps it by one on
///   success; the returned record is what a subsequent read will observe
/// - `provision` only creates missing records and never resets existing state
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn fetch_all(&self, tenant_id: TenantId) -> Result<Vec<Module>, CatalogStoreError>;

    async fn fetch_one(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<Option<Module>, CatalogStoreError>;

    async fn update(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
        patch: ModulePatch,
        expected: ExpectedVersion,
    ) -> Result<Module, CatalogStoreError>;

    /// Create records for a tenant in their provisioned state.
    ///
    /// Returns the tenant's full catalog afterwards.
    async fn provision(
        &self,
        tenant_id: TenantId,
        definitions: Vec<ModuleDefinition>,
    ) -> Result<Vec<Module>, CatalogStoreError>;
}

#[async_trait::async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn fetch_all(&self, tenant_id: TenantId) -> Result<Vec<Module>, CatalogStoreError> {
        (**self).fetch_all(tenant_id).await
    }

    async fn fetch_one(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<Option<Module>, CatalogStoreError> {
        (**self).fetch_one(tenant_id, key).await
    }

    async fn update(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
        patch: ModulePatch,
        expected: ExpectedVersion,
    ) -> Result<Module, CatalogStoreError> {
        (**self).update(tenant_id, key, patch, expected).await
    }

    async fn provision(
        &self,
        tenant_id: TenantId,
        definitions: Vec<ModuleDefinition>,
    ) -> Result<Vec<Module>, CatalogStoreError> {
        (**self).provision(tenant_id, definitions).await
    }
}

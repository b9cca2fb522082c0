use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use opsconsole_core::{Entity, ExpectedVersion, TenantId};
use opsconsole_engines::{
    Module, ModuleDefinition, ModuleKey, ModulePatch, sort_for_presentation,
};

use super::r#trait::{CatalogStore, CatalogStoreError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    tenant_id: TenantId,
    key: ModuleKey,
}

/// In-memory module catalog.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    records: RwLock<HashMap<RecordKey, Module>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> CatalogStoreError {
        CatalogStoreError::Backend("lock poisoned".to_string())
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn fetch_all(&self, tenant_id: TenantId) -> Result<Vec<Module>, CatalogStoreError> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;

        let mut modules: Vec<Module> = records
            .iter()
            .filter(|(k, _)| k.tenant_id == tenant_id)
            .map(|(_, m)| m.clone())
            .collect();
        sort_for_presentation(&mut modules);
        Ok(modules)
    }

    async fn fetch_one(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<Option<Module>, CatalogStoreError> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(records
            .get(&RecordKey {
                tenant_id,
                key: key.clone(),
            })
            .cloned())
    }

    async fn update(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
        patch: ModulePatch,
        expected: ExpectedVersion,
    ) -> Result<Module, CatalogStoreError> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;

        let record = records
            .get_mut(&RecordKey {
                tenant_id,
                key: key.clone(),
            })
            .ok_or_else(|| CatalogStoreError::NotFound(key.clone()))?;

        let current = record.revision();
        expected
            .check(current)
            .map_err(|e| CatalogStoreError::Concurrency(format!("{key}: {e}")))?;

        let mut next = patch.apply_to(record);
        next.revision = current + 1;
        next.updated_at = Some(Utc::now());
        *record = next.clone();

        Ok(next)
    }

    async fn provision(
        &self,
        tenant_id: TenantId,
        definitions: Vec<ModuleDefinition>,
    ) -> Result<Vec<Module>, CatalogStoreError> {
        {
            let mut records = self.records.write().map_err(|_| Self::poisoned())?;
            let now = Utc::now();
            for def in definitions {
                let record_key = RecordKey {
                    tenant_id,
                    key: def.key.clone(),
                };
                records.entry(record_key).or_insert_with(|| {
                    let mut module = Module::provisioned(def);
                    module.updated_at = Some(now);
                    module
                });
            }
        }

        self.fetch_all(tenant_id).await
    }
}

#[cfg(test)]
mod tests {
    use opsconsole_engines::{Category, standard_catalog};

    use super::*;

    fn key(raw: &str) -> ModuleKey {
        ModuleKey::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn provision_creates_records_in_provisioned_state() {
        let store = InMemoryCatalogStore::new();
        let tenant = TenantId::new();

        let modules = store.provision(tenant, standard_catalog()).await.unwrap();
        assert_eq!(modules.len(), standard_catalog().len());
        for m in &modules {
            assert_eq!(m.is_installed, m.is_core);
            assert_eq!(m.is_enabled, m.is_core);
            assert_eq!(m.revision, 0);
        }
    }

    #[tokio::test]
    async fn provision_never_resets_existing_records() {
        let store = InMemoryCatalogStore::new();
        let tenant = TenantId::new();
        store.provision(tenant, standard_catalog()).await.unwrap();

        store
            .update(tenant, &key("crm"), ModulePatch::install(), ExpectedVersion::Exact(0))
            .await
            .unwrap();
        store.provision(tenant, standard_catalog()).await.unwrap();

        let crm = store.fetch_one(tenant, &key("crm")).await.unwrap().unwrap();
        assert!(crm.is_active());
        assert_eq!(crm.revision, 1);
    }

    #[tokio::test]
    async fn update_is_compare_and_swap_on_revision() {
        let store = InMemoryCatalogStore::new();
        let tenant = TenantId::new();
        store.provision(tenant, standard_catalog()).await.unwrap();

        let first = store
            .update(tenant, &key("crm"), ModulePatch::install(), ExpectedVersion::Exact(0))
            .await
            .unwrap();
        assert_eq!(first.revision, 1);

        let stale = store
            .update(tenant, &key("crm"), ModulePatch::enabled(false), ExpectedVersion::Exact(0))
            .await;
        assert!(matches!(
            stale,
            Err(CatalogStoreError::Concurrency(msg))
                if msg.starts_with("crm: conflict") && msg.contains("actual: 1")
        ));

        let reread = store.fetch_one(tenant, &key("crm")).await.unwrap().unwrap();
        assert_eq!(reread, first);
    }

    #[tokio::test]
    async fn update_of_unknown_record_is_not_found() {
        let store = InMemoryCatalogStore::new();
        let result = store
            .update(TenantId::new(), &key("crm"), ModulePatch::install(), ExpectedVersion::Any)
            .await;
        assert!(matches!(result, Err(CatalogStoreError::NotFound(k)) if k == key("crm")));
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let store = InMemoryCatalogStore::new();
        let tenant1 = TenantId::new();
        let tenant2 = TenantId::new();
        store.provision(tenant1, standard_catalog()).await.unwrap();

        assert!(store.fetch_all(tenant2).await.unwrap().is_empty());
        assert!(store.fetch_one(tenant2, &key("crm")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_all_orders_by_sort_order_then_title() {
        let store = InMemoryCatalogStore::new();
        let tenant = TenantId::new();
        store
            .provision(
                tenant,
                vec![
                    ModuleDefinition::new(key("b"), "Bravo", Category::Sales).sort_order(1),
                    ModuleDefinition::new(key("a"), "Alpha", Category::Sales).sort_order(1),
                    ModuleDefinition::new(key("z"), "Zulu", Category::Sales).sort_order(0),
                ],
            )
            .await
            .unwrap();

        let titles: Vec<_> = store
            .fetch_all(tenant)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(titles, vec!["Zulu", "Alpha", "Bravo"]);
    }
}

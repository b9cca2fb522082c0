//! Engine registry: the sole authority over `is_installed` / `is_enabled`.
//!
//! Every mutation follows the same shape:
//!
//! ```text
//! 1. Read the tenant catalog (one fetch_all)
//!   ↓
//! 2. Validate against the dependency graph (pure)
//!   ↓
//! 3. Write the target record, compare-and-swap on its revision
//! ```
//!
//! Only the target row is guarded. Two concurrent mutations on *different* modules
//! of the same tenant are not serialized: one client disabling `crm` while another
//! enables `auction` (which depends on `crm`) can leave `auction` enabled over a
//! disabled prerequisite. This is accepted; consumers filter with
//! [`ModuleRegistry::list_visible`] / [`ModuleRegistry::can_access`], which treat
//! such modules as hidden.
//!
//! ## Disable does not cascade
//!
//! `toggle(.., false)` on a prerequisite leaves its enabled dependents in place
//! (again hidden by the visibility layer), whereas `uninstall` is blocked by
//! enabled dependents. The asymmetry is part of the contract.

mod error;

pub use error::RegistryError;

use tracing::{debug, info, instrument, warn};

use opsconsole_core::{Entity, ExpectedVersion, TenantId};
use opsconsole_engines::{
    Category, CategoryGroups, DependencyGraph, Module, ModuleDefinition, ModuleKey, ModulePatch,
    UnmetDependencies, check_catalog, group_by_category, group_enabled_by_category,
};

use crate::catalog_store::CatalogStore;
use crate::config::RegistryConfig;

/// Tenant-scoped registry service over a [`CatalogStore`].
#[derive(Debug)]
pub struct ModuleRegistry<S> {
    store: S,
    config: RegistryConfig,
}

impl<S> ModuleRegistry<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, RegistryConfig::default())
    }

    pub fn with_config(store: S, config: RegistryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S> ModuleRegistry<S>
where
    S: CatalogStore,
{
    /// Provision a tenant's catalog after validating it.
    ///
    /// Rejects duplicate keys, dependencies on keys outside the batch or the
    /// tenant's existing catalog, and dependency cycles.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, count = definitions.len()))]
    pub async fn provision_tenant(
        &self,
        tenant_id: TenantId,
        definitions: Vec<ModuleDefinition>,
    ) -> Result<Vec<Module>, RegistryError> {
        let existing = self.store.fetch_all(tenant_id).await?;

        let mut combined = existing;
        for def in &definitions {
            if definitions.iter().filter(|d| d.key == def.key).count() > 1 {
                return Err(RegistryError::InvalidCatalog(format!(
                    "duplicate module key {}",
                    def.key
                )));
            }
            if !combined.iter().any(|m| m.key == def.key) {
                combined.push(Module::provisioned(def.clone()));
            }
        }

        // Stored records may carry dangling keys; only the new batch is checked.
        let graph = DependencyGraph::new(&combined);
        for def in &definitions {
            if let Some(dep) = def.depends_on.iter().find(|d| graph.get(d).is_none()) {
                return Err(RegistryError::InvalidCatalog(format!(
                    "{} depends on unknown module {dep}",
                    def.key
                )));
            }
        }
        if let Some(cycle) = graph.find_cycle() {
            let path: Vec<&str> = cycle.iter().map(ModuleKey::as_str).collect();
            return Err(RegistryError::InvalidCatalog(format!(
                "dependency cycle: {}",
                path.join(" -> ")
            )));
        }

        let modules = self.store.provision(tenant_id, definitions).await?;
        info!(modules = modules.len(), "tenant catalog provisioned");
        Ok(modules)
    }

    /// Install `key` (which also enables it).
    ///
    /// Every direct prerequisite must already be installed and enabled; nothing is
    /// written otherwise. Installing an already active module is a no-op.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, module = %key))]
    pub async fn install(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<Module, RegistryError> {
        let (catalog, module) = self.load(tenant_id, key).await?;
        if module.is_core {
            return Ok(module);
        }

        self.ensure_dependencies_met(&catalog, &module)?;
        self.write(tenant_id, &catalog, &module, ModulePatch::install()).await
    }

    /// Uninstall `key` (which also disables it).
    ///
    /// Blocked for core modules and while any enabled module depends on `key`.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, module = %key))]
    pub async fn uninstall(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<(), RegistryError> {
        let (catalog, module) = self.load(tenant_id, key).await?;
        if module.is_core {
            warn!("rejected uninstall of core module");
            return Err(RegistryError::CoreImmutable(module.key));
        }

        let dependents = DependencyGraph::new(&catalog).active_dependents(key);
        if !dependents.is_empty() {
            warn!(
                dependents = dependents.len(),
                "rejected uninstall: module has enabled dependents"
            );
            return Err(RegistryError::DependentsExist {
                module: module.key,
                dependents,
            });
        }

        self.write(tenant_id, &catalog, &module, ModulePatch::uninstall()).await?;
        Ok(())
    }

    /// Enable or disable an installed module.
    ///
    /// Disabling never cascades to dependents. Enabling checks prerequisites
    /// first, then requires the module to be installed.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, module = %key, enabled = enabled))]
    pub async fn toggle(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
        enabled: bool,
    ) -> Result<Module, RegistryError> {
        let (catalog, module) = self.load(tenant_id, key).await?;

        if !enabled {
            if module.is_core {
                warn!("rejected disable of core module");
                return Err(RegistryError::CoreImmutable(module.key));
            }
            return self.write(tenant_id, &catalog, &module, ModulePatch::enabled(false)).await;
        }

        if module.is_core {
            return Ok(module);
        }
        self.ensure_dependencies_met(&catalog, &module)?;
        if !module.is_installed {
            warn!("rejected enable of uninstalled module");
            return Err(RegistryError::NotInstalled(module.key));
        }
        self.write(tenant_id, &catalog, &module, ModulePatch::enabled(true)).await
    }

    /// Enable every directly missing prerequisite of `key`, then `key` itself.
    ///
    /// Prerequisites that are not installed get installed. Only one level is
    /// resolved: a prerequisite with its own unmet dependencies fails with
    /// `MissingDependencies` for that prerequisite. Not atomic: when an
    /// intermediate step fails, prerequisites enabled before it stay enabled.
    /// The whole sequence restarts on a revision conflict, up to
    /// `RegistryConfig::conflict_retries` times.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, module = %key))]
    pub async fn enable_with_dependencies(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<(), RegistryError> {
        let mut attempt = 0;
        loop {
            match self.enable_with_dependencies_once(tenant_id, key).await {
                Err(RegistryError::Conflict(msg)) if attempt < self.config.conflict_retries => {
                    attempt += 1;
                    warn!(attempt, %msg, "revision conflict, restarting enable sequence");
                }
                other => return other,
            }
        }
    }

    async fn enable_with_dependencies_once(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<(), RegistryError> {
        let unmet = self.missing_dependencies(tenant_id, key).await?;
        if let Some(unknown) = unmet.unknown.into_iter().next() {
            return Err(RegistryError::ModuleNotFound(unknown));
        }

        for dependency in &unmet.modules {
            self.activate(tenant_id, &dependency.key).await?;
        }
        self.activate(tenant_id, key).await?;
        Ok(())
    }

    async fn activate(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<Module, RegistryError> {
        let module = self.get_by_key(tenant_id, key).await?;
        if module.is_installed {
            self.toggle(tenant_id, key, true).await
        } else {
            self.install(tenant_id, key).await
        }
    }

    /// Onboarding: enable each selected module together with its direct
    /// prerequisites, in order.
    ///
    /// Stops at the first failure; modules enabled before it stay enabled.
    /// Returns the tenant's enabled modules afterwards.
    #[instrument(skip_all, fields(tenant_id = %tenant_id, count = keys.len()))]
    pub async fn enable_selected(
        &self,
        tenant_id: TenantId,
        keys: &[ModuleKey],
    ) -> Result<Vec<Module>, RegistryError> {
        for key in keys {
            self.enable_with_dependencies(tenant_id, key).await?;
        }
        self.list_enabled(tenant_id).await
    }

    /// Direct prerequisites of `key` that are not installed-and-enabled.
    pub async fn missing_dependencies(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<UnmetDependencies, RegistryError> {
        let (catalog, module) = self.load(tenant_id, key).await?;
        Ok(DependencyGraph::new(&catalog).unmet_dependencies(&module))
    }

    /// All modules, `sort_order` then title.
    pub async fn list_all(&self, tenant_id: TenantId) -> Result<Vec<Module>, RegistryError> {
        Ok(self.store.fetch_all(tenant_id).await?)
    }

    /// Installed and enabled modules.
    pub async fn list_enabled(&self, tenant_id: TenantId) -> Result<Vec<Module>, RegistryError> {
        let mut modules = self.list_all(tenant_id).await?;
        modules.retain(Module::is_active);
        Ok(modules)
    }

    pub async fn list_by_category(
        &self,
        tenant_id: TenantId,
        category: Category,
    ) -> Result<Vec<Module>, RegistryError> {
        let mut modules = self.list_all(tenant_id).await?;
        modules.retain(|m| m.category == category);
        Ok(modules)
    }

    pub async fn get_by_key(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<Module, RegistryError> {
        self.store
            .fetch_one(tenant_id, key)
            .await?
            .ok_or_else(|| RegistryError::ModuleNotFound(key.clone()))
    }

    pub async fn group_by_category(
        &self,
        tenant_id: TenantId,
    ) -> Result<CategoryGroups, RegistryError> {
        let modules = self.list_all(tenant_id).await?;
        Ok(group_by_category(&modules))
    }

    pub async fn group_enabled_by_category(
        &self,
        tenant_id: TenantId,
    ) -> Result<CategoryGroups, RegistryError> {
        let modules = self.list_all(tenant_id).await?;
        Ok(group_enabled_by_category(&modules))
    }

    /// Modules navigation may render: active with every prerequisite chain active.
    pub async fn list_visible(&self, tenant_id: TenantId) -> Result<Vec<Module>, RegistryError> {
        let modules = self.list_all(tenant_id).await?;
        Ok(DependencyGraph::new(&modules).visible_modules())
    }

    /// Routing guard for a module workspace. Unknown keys are not accessible.
    pub async fn can_access(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<bool, RegistryError> {
        let modules = self.list_all(tenant_id).await?;
        Ok(DependencyGraph::new(&modules).is_visible(key))
    }

    async fn load(
        &self,
        tenant_id: TenantId,
        key: &ModuleKey,
    ) -> Result<(Vec<Module>, Module), RegistryError> {
        let catalog = self.store.fetch_all(tenant_id).await?;
        let module = catalog
            .iter()
            .find(|m| &m.key == key)
            .cloned()
            .ok_or_else(|| RegistryError::ModuleNotFound(key.clone()))?;
        Ok((catalog, module))
    }

    fn ensure_dependencies_met(
        &self,
        catalog: &[Module],
        module: &Module,
    ) -> Result<(), RegistryError> {
        let unmet = DependencyGraph::new(catalog).unmet_dependencies(module);
        if unmet.is_empty() {
            return Ok(());
        }
        warn!(unmet = unmet.len(), "rejected: unmet dependencies");
        Err(RegistryError::MissingDependencies {
            module: module.key.clone(),
            unmet,
        })
    }

    /// Persist `patch` against the revision read in this operation.
    async fn write(
        &self,
        tenant_id: TenantId,
        catalog: &[Module],
        current: &Module,
        patch: ModulePatch,
    ) -> Result<Module, RegistryError> {
        if patch.is_noop_for(current) {
            return Ok(current.clone());
        }

        let updated = self
            .store
            .update(tenant_id, current.id(), patch, ExpectedVersion::Exact(current.revision()))
            .await?;
        info!(
            installed = updated.is_installed,
            enabled = updated.is_enabled,
            revision = updated.revision,
            "module state changed"
        );

        if tracing::enabled!(tracing::Level::DEBUG) {
            let after: Vec<Module> = catalog
                .iter()
                .map(|m| if m.key == updated.key { updated.clone() } else { m.clone() })
                .collect();
            for violation in check_catalog(&after) {
                debug!(?violation, "catalog invariant not satisfied after write");
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use opsconsole_engines::standard_catalog;

    use super::*;
    use crate::catalog_store::InMemoryCatalogStore;

    fn key(raw: &str) -> ModuleKey {
        ModuleKey::parse(raw).unwrap()
    }

    async fn setup() -> (ModuleRegistry<Arc<InMemoryCatalogStore>>, TenantId) {
        let registry = ModuleRegistry::new(Arc::new(InMemoryCatalogStore::new()));
        let tenant = TenantId::new();
        registry.provision_tenant(tenant, standard_catalog()).await.unwrap();
        (registry, tenant)
    }

    #[tokio::test]
    async fn unknown_module_is_not_found_everywhere() {
        let (registry, tenant) = setup().await;
        let ghost = key("ghost");

        assert!(matches!(
            registry.install(tenant, &ghost).await,
            Err(RegistryError::ModuleNotFound(_))
        ));
        assert!(matches!(
            registry.uninstall(tenant, &ghost).await,
            Err(RegistryError::ModuleNotFound(_))
        ));
        assert!(matches!(
            registry.toggle(tenant, &ghost, true).await,
            Err(RegistryError::ModuleNotFound(_))
        ));
        assert!(matches!(
            registry.get_by_key(tenant, &ghost).await,
            Err(RegistryError::ModuleNotFound(_))
        ));
        assert!(!registry.can_access(tenant, &ghost).await.unwrap());
    }

    #[tokio::test]
    async fn enabling_an_uninstalled_module_requires_install() {
        let (registry, tenant) = setup().await;

        let err = registry.toggle(tenant, &key("crm"), true).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotInstalled(k) if k == key("crm")));
        assert!(!registry.get_by_key(tenant, &key("crm")).await.unwrap().is_enabled);
    }

    #[tokio::test]
    async fn noop_mutations_do_not_bump_the_revision() {
        let (registry, tenant) = setup().await;

        let first = registry.install(tenant, &key("crm")).await.unwrap();
        let second = registry.install(tenant, &key("crm")).await.unwrap();
        assert_eq!(first, second);

        let inventory = registry.install(tenant, &key("inventory")).await.unwrap();
        assert_eq!(inventory.revision, 0);
    }

    #[tokio::test]
    async fn provisioning_rejects_cycles_and_unknown_dependencies() {
        let registry = ModuleRegistry::new(InMemoryCatalogStore::new());
        let tenant = TenantId::new();

        let cyclic = vec![
            ModuleDefinition::new(key("a"), "A", Category::Sales).depends_on([key("b")]),
            ModuleDefinition::new(key("b"), "B", Category::Sales).depends_on([key("a")]),
        ];
        let err = registry.provision_tenant(tenant, cyclic).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCatalog(msg) if msg.contains("cycle")));

        let dangling =
            vec![ModuleDefinition::new(key("a"), "A", Category::Sales).depends_on([key("zzz")])];
        let err = registry.provision_tenant(tenant, dangling).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCatalog(msg) if msg.contains("zzz")));

        let duplicated = vec![
            ModuleDefinition::new(key("a"), "A", Category::Sales),
            ModuleDefinition::new(key("a"), "A again", Category::Sales),
        ];
        let err = registry.provision_tenant(tenant, duplicated).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCatalog(msg) if msg.contains("duplicate")));

        assert!(registry.list_all(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enable_with_dependencies_rejects_dangling_prerequisites_before_writing() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let tenant = TenantId::new();
        // Bypass registry validation to simulate a dependency whose record was removed.
        store
            .provision(
                tenant,
                vec![
                    ModuleDefinition::new(key("crm"), "CRM", Category::Sales),
                    ModuleDefinition::new(key("auction"), "Auction", Category::Sales)
                        .depends_on([key("crm"), key("legacy_bids")]),
                ],
            )
            .await
            .unwrap();
        let registry = ModuleRegistry::new(store);

        let unmet = registry.missing_dependencies(tenant, &key("auction")).await.unwrap();
        assert_eq!(unmet.keys(), vec![key("crm"), key("legacy_bids")]);

        let err = registry.enable_with_dependencies(tenant, &key("auction")).await.unwrap_err();
        assert!(matches!(err, RegistryError::ModuleNotFound(k) if k == key("legacy_bids")));
        assert!(registry.list_enabled(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn provisioning_tolerates_dangling_keys_already_stored() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let tenant = TenantId::new();
        store
            .provision(
                tenant,
                vec![
                    ModuleDefinition::new(key("auction"), "Auction", Category::Sales)
                        .depends_on([key("legacy_bids")]),
                ],
            )
            .await
            .unwrap();
        let registry = ModuleRegistry::new(store);

        let modules = registry
            .provision_tenant(
                tenant,
                vec![
                    ModuleDefinition::new(key("crm"), "CRM", Category::Sales),
                    ModuleDefinition::new(key("bidding"), "Bidding", Category::Sales)
                        .depends_on([key("auction")]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(modules.len(), 3);

        let unmet = registry.missing_dependencies(tenant, &key("auction")).await.unwrap();
        assert_eq!(unmet.unknown, vec![key("legacy_bids")]);

        let err = registry
            .provision_tenant(
                tenant,
                vec![
                    ModuleDefinition::new(key("lots"), "Lots", Category::Sales)
                        .depends_on([key("legacy_bids")]),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidCatalog(msg) if msg.contains("legacy_bids")));
        assert!(registry.get_by_key(tenant, &key("lots")).await.is_err());
    }
}

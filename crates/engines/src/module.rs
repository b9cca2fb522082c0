//! Engine module records, provisioning definitions and flag patches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use opsconsole_core::Entity;

use crate::category::Category;
use crate::key::ModuleKey;

/// One engine record for one tenant.
///
/// Only the registry flips `is_installed` / `is_enabled`; everything else is set
/// at provisioning time. `revision` is the store-maintained concurrency token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub key: ModuleKey,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub category: Category,
    pub is_core: bool,
    pub is_installed: bool,
    pub is_enabled: bool,
    pub depends_on: Vec<ModuleKey>,
    pub workspace_route: Option<String>,
    pub settings_route: Option<String>,
    pub sort_order: i32,
    pub version: String,
    pub revision: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Module {
    /// Initial record created by tenant provisioning.
    pub fn provisioned(def: ModuleDefinition) -> Self {
        Self {
            key: def.key,
            title: def.title,
            description: def.description,
            icon: def.icon,
            category: def.category,
            is_core: def.is_core,
            is_installed: def.is_core,
            is_enabled: def.is_core,
            depends_on: def.depends_on,
            workspace_route: def.workspace_route,
            settings_route: def.settings_route,
            sort_order: def.sort_order,
            version: def.version,
            revision: 0,
            updated_at: None,
        }
    }

    /// Installed and enabled.
    pub fn is_active(&self) -> bool {
        self.is_installed && self.is_enabled
    }

    pub fn depends_on_key(&self, key: &ModuleKey) -> bool {
        self.depends_on.iter().any(|d| d == key)
    }
}

impl Entity for Module {
    type Id = ModuleKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

/// Catalog-authored template for a module record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub key: ModuleKey,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub category: Category,
    pub is_core: bool,
    pub depends_on: Vec<ModuleKey>,
    pub workspace_route: Option<String>,
    pub settings_route: Option<String>,
    pub sort_order: i32,
    pub version: String,
}

impl ModuleDefinition {
    pub fn new(key: ModuleKey, title: impl Into<String>, category: Category) -> Self {
        Self {
            key,
            title: title.into(),
            description: String::new(),
            icon: String::new(),
            category,
            is_core: false,
            depends_on: Vec::new(),
            workspace_route: None,
            settings_route: None,
            sort_order: 0,
            version: "1.0.0".to_owned(),
        }
    }

    pub fn core(mut self) -> Self {
        self.is_core = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Declared prerequisites. Duplicates are dropped, first occurrence wins.
    pub fn depends_on(mut self, keys: impl IntoIterator<Item = ModuleKey>) -> Self {
        for key in keys {
            if !self.depends_on.contains(&key) {
                self.depends_on.push(key);
            }
        }
        self
    }

    pub fn routes(mut self, workspace: Option<String>, settings: Option<String>) -> Self {
        self.workspace_route = workspace;
        self.settings_route = settings;
        self
    }

    pub fn sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Flag update sent to the catalog store.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePatch {
    pub is_installed: Option<bool>,
    pub is_enabled: Option<bool>,
}

impl ModulePatch {
    pub fn install() -> Self {
        Self {
            is_installed: Some(true),
            is_enabled: Some(true),
        }
    }

    pub fn uninstall() -> Self {
        Self {
            is_installed: Some(false),
            is_enabled: Some(false),
        }
    }

    pub fn enabled(enabled: bool) -> Self {
        Self {
            is_installed: None,
            is_enabled: Some(enabled),
        }
    }

    /// The record with this patch applied (revision untouched).
    pub fn apply_to(&self, module: &Module) -> Module {
        let mut next = module.clone();
        if let Some(installed) = self.is_installed {
            next.is_installed = installed;
        }
        if let Some(enabled) = self.is_enabled {
            next.is_enabled = enabled;
        }
        next
    }

    pub fn is_noop_for(&self, module: &Module) -> bool {
        self.is_installed.is_none_or(|v| v == module.is_installed)
            && self.is_enabled.is_none_or(|v| v == module.is_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> ModuleKey {
        ModuleKey::parse(raw).unwrap()
    }

    #[test]
    fn provisioned_state_follows_is_core() {
        let core = Module::provisioned(
            ModuleDefinition::new(key("inventory"), "Inventory", Category::Operations).core(),
        );
        assert!(core.is_installed && core.is_enabled);

        let optional =
            Module::provisioned(ModuleDefinition::new(key("crm"), "CRM", Category::Sales));
        assert!(!optional.is_installed && !optional.is_enabled);
        assert_eq!(optional.revision, 0);
    }

    #[test]
    fn depends_on_drops_duplicates() {
        let def = ModuleDefinition::new(key("auction"), "Auction", Category::Sales)
            .depends_on([key("crm"), key("sales"), key("crm")]);
        assert_eq!(def.depends_on, vec![key("crm"), key("sales")]);
    }

    #[test]
    fn patch_application_and_noop_detection() {
        let module = Module::provisioned(ModuleDefinition::new(key("crm"), "CRM", Category::Sales));

        assert!(ModulePatch::uninstall().is_noop_for(&module));
        assert!(!ModulePatch::install().is_noop_for(&module));

        let installed = ModulePatch::install().apply_to(&module);
        assert!(installed.is_active());

        let disabled = ModulePatch::enabled(false).apply_to(&installed);
        assert!(disabled.is_installed);
        assert!(!disabled.is_enabled);
    }
}

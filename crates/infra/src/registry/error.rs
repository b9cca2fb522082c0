use thiserror::Error;

use opsconsole_engines::{Module, ModuleKey, UnmetDependencies};

use crate::catalog_store::CatalogStoreError;

fn list_unmet(unmet: &UnmetDependencies) -> String {
    unmet
        .keys()
        .iter()
        .map(ModuleKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn list_modules(modules: &[Module]) -> String {
    modules
        .iter()
        .map(|m| m.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of a registry operation.
///
/// Every variant is recoverable by the caller; none of them is fatal to the
/// process. `MissingDependencies` is meant to be surfaced as an actionable prompt
/// ("enable these too?") backed by `enable_with_dependencies`.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("module not found: {0}")]
    ModuleNotFound(ModuleKey),

    #[error("core module {0} cannot be disabled or uninstalled")]
    CoreImmutable(ModuleKey),

    /// Enabling requires a prior install.
    #[error("module {0} is not installed")]
    NotInstalled(ModuleKey),

    #[error("{module} has unmet dependencies: {}", list_unmet(.unmet))]
    MissingDependencies {
        module: ModuleKey,
        unmet: UnmetDependencies,
    },

    #[error("{module} is required by enabled modules: {}", list_modules(.dependents))]
    DependentsExist {
        module: ModuleKey,
        dependents: Vec<Module>,
    },

    /// The record changed between read and write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Provisioning input failed validation.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error(transparent)]
    Store(CatalogStoreError),
}

impl RegistryError {
    /// Stable machine-readable code for consumers.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::ModuleNotFound(_) => "module_not_found",
            RegistryError::CoreImmutable(_) => "core_immutable",
            RegistryError::NotInstalled(_) => "not_installed",
            RegistryError::MissingDependencies { .. } => "missing_dependencies",
            RegistryError::DependentsExist { .. } => "dependents_exist",
            RegistryError::Conflict(_) => "conflict",
            RegistryError::InvalidCatalog(_) => "invalid_catalog",
            RegistryError::Store(_) => "store_error",
        }
    }
}

impl From<CatalogStoreError> for RegistryError {
    fn from(value: CatalogStoreError) -> Self {
        match value {
            CatalogStoreError::Concurrency(msg) => RegistryError::Conflict(msg),
            other => RegistryError::Store(other),
        }
    }
}

//! Catalog-wide invariant audit.

use serde::Serialize;

use crate::graph::DependencyGraph;
use crate::key::ModuleKey;
use crate::module::Module;

/// One breach of the catalog invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogViolation {
    /// A core module is not installed-and-enabled.
    CoreInactive { module: ModuleKey },
    /// A module is enabled without being installed.
    EnabledNotInstalled { module: ModuleKey },
    /// An enabled module has a prerequisite that is not installed-and-enabled.
    ///
    /// Disabling never cascades, so this one can legitimately appear after a
    /// prerequisite is switched off.
    UnmetDependency {
        module: ModuleKey,
        dependency: ModuleKey,
    },
}

pub fn check_catalog(modules: &[Module]) -> Vec<CatalogViolation> {
    let graph = DependencyGraph::new(modules);
    let mut violations = Vec::new();

    for module in modules {
        if module.is_core && !module.is_active() {
            violations.push(CatalogViolation::CoreInactive {
                module: module.key.clone(),
            });
        }
        if module.is_enabled && !module.is_installed {
            violations.push(CatalogViolation::EnabledNotInstalled {
                module: module.key.clone(),
            });
        }
        if module.is_enabled {
            for dependency in graph.unmet_dependencies(module).keys() {
                violations.push(CatalogViolation::UnmetDependency {
                    module: module.key.clone(),
                    dependency,
                });
            }
        }
    }

    violations
}

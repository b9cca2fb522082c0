//! Engine (feature module) domain.
//!
//! This crate models the per-tenant catalog of optional console engines and the
//! pure logic layered on it: key validation, the dependency graph, derived
//! presentation views and catalog invariant checks. No IO lives here; the
//! registry service in `opsconsole-infra` composes it with a catalog store.

pub mod catalog;
pub mod category;
pub mod graph;
pub mod invariants;
pub mod key;
pub mod module;
pub mod view;

pub use catalog::standard_catalog;
pub use category::Category;
pub use graph::{CycleError, DependencyGraph, UnmetDependencies};
pub use invariants::{CatalogViolation, check_catalog};
pub use key::ModuleKey;
pub use module::{Module, ModuleDefinition, ModulePatch};
pub use view::{CategoryGroups, group_by_category, group_enabled_by_category, sort_for_presentation};

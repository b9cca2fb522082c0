//! Dependency graph over one tenant's already-fetched catalog.
//!
//! All lookups are pure. Dependency keys that name no record (deleted or renamed
//! engines) are treated as unmet, never as a lookup failure.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::key::ModuleKey;
use crate::module::Module;

/// A dependency cycle, as the path of keys that closes back on its first entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle detected: {}", join_keys(.path))]
pub struct CycleError {
    pub path: Vec<ModuleKey>,
}

fn join_keys(keys: &[ModuleKey]) -> String {
    keys.iter()
        .map(ModuleKey::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Direct prerequisites of a module that are not installed-and-enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnmetDependencies {
    /// Known records, in `depends_on` order.
    pub modules: Vec<Module>,
    /// Dangling keys with no record in the catalog.
    pub unknown: Vec<ModuleKey>,
}

impl UnmetDependencies {
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.unknown.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len() + self.unknown.len()
    }

    /// Every unmet key, known records first.
    pub fn keys(&self) -> Vec<ModuleKey> {
        self.modules
            .iter()
            .map(|m| m.key.clone())
            .chain(self.unknown.iter().cloned())
            .collect()
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Read-only view of a catalog indexed by key.
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    modules: &'a [Module],
    by_key: HashMap<&'a ModuleKey, &'a Module>,
}

impl<'a> DependencyGraph<'a> {
    pub fn new(modules: &'a [Module]) -> Self {
        let by_key = modules.iter().map(|m| (&m.key, m)).collect();
        Self { modules, by_key }
    }

    pub fn get(&self, key: &ModuleKey) -> Option<&'a Module> {
        self.by_key.get(key).copied()
    }

    pub fn modules(&self) -> &'a [Module] {
        self.modules
    }

    pub fn unmet_dependencies(&self, module: &Module) -> UnmetDependencies {
        let mut unmet = UnmetDependencies::default();
        for dep in &module.depends_on {
            match self.get(dep) {
                Some(found) if found.is_active() => {}
                Some(found) => unmet.modules.push(found.clone()),
                None => unmet.unknown.push(dep.clone()),
            }
        }
        unmet
    }

    /// Enabled modules that list `key` as a prerequisite.
    pub fn active_dependents(&self, key: &ModuleKey) -> Vec<Module> {
        self.modules
            .iter()
            .filter(|m| &m.key != key && m.is_enabled && m.depends_on_key(key))
            .cloned()
            .collect()
    }

    /// Full prerequisite closure of `key`, dependencies before dependents.
    ///
    /// Dangling keys are included but not descended into. `key` itself is not
    /// part of the result.
    pub fn transitive_dependencies(&self, key: &ModuleKey) -> Result<Vec<ModuleKey>, CycleError> {
        let mut marks = HashMap::new();
        let mut path = Vec::new();
        let mut order = Vec::new();
        self.visit(key, &mut marks, &mut path, &mut order)?;
        order.retain(|k| k != key);
        Ok(order)
    }

    /// First cycle found across the whole catalog, if any.
    pub fn find_cycle(&self) -> Option<Vec<ModuleKey>> {
        let mut marks = HashMap::new();
        for module in self.modules {
            let mut path = Vec::new();
            let mut order = Vec::new();
            if let Err(cycle) = self.visit(&module.key, &mut marks, &mut path, &mut order) {
                return Some(cycle.path);
            }
        }
        None
    }

    fn visit(
        &self,
        key: &ModuleKey,
        marks: &mut HashMap<ModuleKey, Mark>,
        path: &mut Vec<ModuleKey>,
        order: &mut Vec<ModuleKey>,
    ) -> Result<(), CycleError> {
        match marks.get(key) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|k| k == key).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(key.clone());
                return Err(CycleError { path: cycle });
            }
            None => {}
        }

        let Some(module) = self.get(key) else {
            marks.insert(key.clone(), Mark::Done);
            order.push(key.clone());
            return Ok(());
        };

        marks.insert(key.clone(), Mark::Visiting);
        path.push(key.clone());
        for dep in &module.depends_on {
            self.visit(dep, marks, path, order)?;
        }
        path.pop();
        marks.insert(key.clone(), Mark::Done);
        order.push(key.clone());
        Ok(())
    }

    /// Whether consumers may show or route to `key`.
    ///
    /// Requires the module and, recursively, all of its prerequisites to be
    /// installed and enabled. Modules on a cycle are never visible.
    pub fn is_visible(&self, key: &ModuleKey) -> bool {
        let mut visiting = HashSet::new();
        self.visible_inner(key, &mut visiting)
    }

    fn visible_inner(&self, key: &ModuleKey, visiting: &mut HashSet<&'a ModuleKey>) -> bool {
        let Some(module) = self.get(key) else {
            return false;
        };
        if !module.is_active() || !visiting.insert(&module.key) {
            return false;
        }
        let satisfied = module
            .depends_on
            .iter()
            .all(|dep| self.visible_inner(dep, visiting));
        visiting.remove(&module.key);
        satisfied
    }

    /// Visible modules in catalog order.
    pub fn visible_modules(&self) -> Vec<Module> {
        self.modules
            .iter()
            .filter(|m| self.is_visible(&m.key))
            .cloned()
            .collect()
    }
}

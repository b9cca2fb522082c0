//! Derived presentation views over a module list.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::category::Category;
use crate::module::Module;

/// `sort_order` ascending, ties broken by title.
pub fn sort_for_presentation(modules: &mut [Module]) {
    modules.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.title.cmp(&b.title))
    });
}

/// Modules partitioned into the five fixed categories.
///
/// Every category is present, possibly with an empty list; each list is sorted
/// by title ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryGroups(BTreeMap<Category, Vec<Module>>);

impl CategoryGroups {
    pub fn get(&self, category: Category) -> &[Module] {
        self.0.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[Module])> {
        self.0.iter().map(|(c, m)| (*c, m.as_slice()))
    }

    /// Number of categories (always five).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_inner(self) -> BTreeMap<Category, Vec<Module>> {
        self.0
    }
}

pub fn group_by_category<'a>(modules: impl IntoIterator<Item = &'a Module>) -> CategoryGroups {
    let mut groups: BTreeMap<Category, Vec<Module>> =
        Category::ALL.into_iter().map(|c| (c, Vec::new())).collect();

    for module in modules {
        groups.entry(module.category).or_default().push(module.clone());
    }
    for list in groups.values_mut() {
        list.sort_by(|a, b| a.title.cmp(&b.title));
    }

    CategoryGroups(groups)
}

/// Same as [`group_by_category`] restricted to installed-and-enabled modules.
pub fn group_enabled_by_category<'a>(
    modules: impl IntoIterator<Item = &'a Module>,
) -> CategoryGroups {
    group_by_category(modules.into_iter().filter(|m| m.is_active()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ModuleKey;
    use crate::module::ModuleDefinition;

    fn module(key: &str, title: &str, category: Category, sort_order: i32) -> Module {
        Module::provisioned(
            ModuleDefinition::new(ModuleKey::parse(key).unwrap(), title, category)
                .sort_order(sort_order),
        )
    }

    fn titles(list: &[Module]) -> Vec<&str> {
        list.iter().map(|m| m.title.as_str()).collect()
    }

    #[test]
    fn five_modules_over_four_categories_keep_all_five_keys() {
        let modules = vec![
            module("sales", "Sales", Category::Sales, 1),
            module("crm", "CRM", Category::Sales, 2),
            module("inventory", "Inventory", Category::Operations, 1),
            module("reporting", "Reporting", Category::Business, 1),
            module("users", "Users", Category::Admin, 1),
        ];

        let groups = group_by_category(&modules);

        assert_eq!(groups.len(), 5);
        assert_eq!(titles(groups.get(Category::Sales)), vec!["CRM", "Sales"]);
        assert_eq!(titles(groups.get(Category::Operations)), vec!["Inventory"]);
        assert_eq!(titles(groups.get(Category::Business)), vec!["Reporting"]);
        assert_eq!(titles(groups.get(Category::Admin)), vec!["Users"]);
        assert!(groups.get(Category::System).is_empty());

        let order: Vec<_> = groups.iter().map(|(c, _)| c).collect();
        assert_eq!(order, Category::ALL.to_vec());
    }

    #[test]
    fn empty_categories_serialize_as_empty_arrays() {
        let groups = group_by_category(std::iter::empty());
        let json = serde_json::to_value(&groups).unwrap();
        for category in Category::ALL {
            assert_eq!(json[category.as_str()], serde_json::json!([]));
        }
    }

    #[test]
    fn enabled_variant_drops_inactive_modules() {
        let mut crm = module("crm", "CRM", Category::Sales, 1);
        crm.is_installed = true;
        crm.is_enabled = true;
        let mut sales = module("sales", "Sales", Category::Sales, 2);
        sales.is_installed = true;

        let groups = group_enabled_by_category(&[crm, sales]);
        assert_eq!(titles(groups.get(Category::Sales)), vec!["CRM"]);
    }

    #[test]
    fn presentation_sort_uses_sort_order_then_title() {
        let mut modules = vec![
            module("b", "Bravo", Category::Sales, 2),
            module("c", "Charlie", Category::Sales, 1),
            module("a", "Alpha", Category::Sales, 2),
        ];
        sort_for_presentation(&mut modules);
        assert_eq!(titles(&modules), vec!["Charlie", "Alpha", "Bravo"]);
    }

    #[test]
    fn titles_compare_by_byte_value() {
        let mut modules = vec![
            module("a", "alpha", Category::Sales, 0),
            module("z", "Zeta", Category::Sales, 0),
        ];
        sort_for_presentation(&mut modules);
        assert_eq!(titles(&modules), vec!["Zeta", "alpha"]);
    }
}

//! Standard engine catalog provisioned for new tenants.

use crate::category::Category;
use crate::key::ModuleKey;
use crate::module::ModuleDefinition;

fn engine(key: &'static str, title: &str, category: Category, sort_order: i32) -> ModuleDefinition {
    ModuleDefinition::new(ModuleKey::from_static(key), title, category)
        .sort_order(sort_order)
        .routes(
            Some(format!("/{}", key.replace('_', "-"))),
            Some(format!("/settings/engines/{key}")),
        )
}

fn keys(raw: &[&'static str]) -> Vec<ModuleKey> {
    raw.iter().map(|k| ModuleKey::from_static(*k)).collect()
}

/// Engines every tenant is provisioned with.
///
/// `inventory` and `settings` are core. The dependency graph is acyclic.
pub fn standard_catalog() -> Vec<ModuleDefinition> {
    vec![
        engine("inventory", "Inventory", Category::Operations, 10)
            .core()
            .icon("boxes")
            .description("Assets, stock levels and warehouse locations"),
        engine("purchasing", "Purchasing", Category::Operations, 20)
            .icon("truck")
            .description("Purchase orders, suppliers and receiving")
            .depends_on(keys(&["inventory"])),
        engine("recycling", "Recycling & ITAD", Category::Operations, 30)
            .icon("recycle")
            .description("Asset intake, data destruction and certificates")
            .depends_on(keys(&["inventory"])),
        engine("sales", "Sales", Category::Sales, 10)
            .icon("receipt")
            .description("Quotes, sales orders and fulfilment")
            .depends_on(keys(&["inventory"])),
        engine("crm", "CRM", Category::Sales, 20)
            .icon("users")
            .description("Leads, contacts and pipeline"),
        engine("auction", "Auctions", Category::Sales, 30)
            .icon("gavel")
            .description("Lot listings and bidder management")
            .depends_on(keys(&["crm", "sales"])),
        engine("invoicing", "Invoicing", Category::Business, 10)
            .icon("file-text")
            .description("Invoices, payments and receivables")
            .depends_on(keys(&["sales"])),
        engine("reporting", "Reporting", Category::Business, 20)
            .icon("bar-chart")
            .description("Dashboards and exports")
            .depends_on(keys(&["inventory"])),
        engine("website", "Website CMS", Category::Business, 30)
            .icon("globe")
            .description("Pages, navigation and storefront content"),
        engine("settings", "Settings", Category::System, 10)
            .core()
            .icon("settings")
            .description("Company profile and preferences"),
        engine("users", "Users & Roles", Category::Admin, 10)
            .icon("shield")
            .description("Team members and role assignments"),
        engine("audit_log", "Audit Log", Category::Admin, 20)
            .icon("history")
            .description("Activity trail across engines")
            .depends_on(keys(&["users"])),
    ]
}

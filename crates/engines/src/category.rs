//! Presentation categories for engines.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use opsconsole_core::DomainError;

/// Closed set of sidebar/launcher categories.
///
/// Declaration order is the display order of grouped views.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Operations,
    Sales,
    Business,
    System,
    Admin,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Operations,
        Category::Sales,
        Category::Business,
        Category::System,
        Category::Admin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Operations => "operations",
            Category::Sales => "sales",
            Category::Business => "business",
            Category::System => "system",
            Category::Admin => "admin",
        }
    }
}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "operations" => Ok(Category::Operations),
            "sales" => Ok(Category::Sales),
            "business" => Ok(Category::Business),
            "system" => Ok(Category::System),
            "admin" => Ok(Category::Admin),
            _ => Err(DomainError::validation(
                "category must be one of: operations, sales, business, system, admin",
            )),
        }
    }
}

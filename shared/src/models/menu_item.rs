//! Menu Item Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Menu item entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    /// Price in currency unit (>= 0)
    pub price: Decimal,
    /// Free-text category label, grouped by [`category_key`]
    pub category: String,
    /// Controls customer visibility only; unavailable items stay in history
    pub available: bool,
}

/// Create menu item payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItemCreate {
    pub name: String,
    pub price: Decimal,
    pub category: String,
    pub available: Option<bool>,
}

/// Update menu item payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenuItemUpdate {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub available: Option<bool>,
}

impl MenuItemUpdate {
    /// Apply the present fields onto an existing item
    pub fn apply_to(self, item: &mut MenuItem) {
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(available) = self.available {
            item.available = available;
        }
    }
}

/// A display group of menu items sharing one category key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuCategory {
    pub name: String,
    pub items: Vec<MenuItem>,
}

/// Grouping key for a category label.
///
/// Exact, case-sensitive match: "Drinks" and "drinks" are two groups.
/// Every grouping site goes through this function.
pub fn category_key(category: &str) -> &str {
    category
}

/// Group items by [`category_key`], preserving first-appearance order of
/// groups and the input order of items inside each group.
pub fn group_by_category(items: impl IntoIterator<Item = MenuItem>) -> Vec<MenuCategory> {
    let mut groups: Vec<MenuCategory> = Vec::new();
    for item in items {
        match groups
            .iter_mut()
            .find(|g| category_key(&g.name) == category_key(&item.category))
        {
            Some(group) => group.items.push(item),
            None => groups.push(MenuCategory {
                name: item.category.clone(),
                items: vec![item],
            }),
        }
    }
    groups
}

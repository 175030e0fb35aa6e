//! Cart: the pre-submission selection of one chat session

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::money::{MoneyError, subtotal_of};
use crate::error::{AppError, ErrorCode};
use crate::models::{MenuItem, OrderItem};

/// Most units one cart line may hold
pub const MAX_LINE_QUANTITY: u32 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("at most {max} of item {menu_item_id} per order")]
    QuantityLimit { menu_item_id: i64, max: u32 },
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::QuantityLimit { menu_item_id, max } => {
                AppError::with_message(ErrorCode::ValueOutOfRange, err.to_string())
                    .with_detail("field", "quantity")
                    .with_detail("menu_item_id", menu_item_id)
                    .with_detail("max", max)
            }
        }
    }
}

/// Ordered cart lines, at most one per menu item id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<OrderItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit: increments the existing line or appends a snapshot
    /// of the menu item with quantity 1. Returns the new line quantity.
    pub fn add(&mut self, item: &MenuItem) -> Result<u32, CartError> {
        if let Some(line) = self.lines.iter_mut().find(|l| l.id == item.id) {
            if line.quantity >= MAX_LINE_QUANTITY {
                return Err(CartError::QuantityLimit {
                    menu_item_id: item.id,
                    max: MAX_LINE_QUANTITY,
                });
            }
            line.quantity += 1;
            return Ok(line.quantity);
        }
        self.lines.push(OrderItem {
            id: item.id,
            name: item.name.clone(),
            price: item.price,
            category: item.category.clone(),
            quantity: 1,
        });
        Ok(1)
    }

    /// Delete the whole line; false when absent
    pub fn remove(&mut self, menu_item_id: i64) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != menu_item_id);
        self.lines.len() != before
    }

    /// Change a line's quantity by `delta`.
    ///
    /// Returns the new quantity, or `None` when the line was removed
    /// (result ≤ 0) or never existed. A result above [`MAX_LINE_QUANTITY`]
    /// leaves the line untouched.
    pub fn adjust_quantity(&mut self, menu_item_id: i64, delta: i32) -> Result<Option<u32>, CartError> {
        let Some(pos) = self.lines.iter().position(|l| l.id == menu_item_id) else {
            return Ok(None);
        };
        let next = i64::from(self.lines[pos].quantity) + i64::from(delta);
        if next <= 0 {
            self.lines.remove(pos);
            return Ok(None);
        }
        let next = u32::try_from(next)
            .ok()
            .filter(|q| *q <= MAX_LINE_QUANTITY)
            .ok_or(CartError::QuantityLimit {
                menu_item_id,
                max: MAX_LINE_QUANTITY,
            })?;
        self.lines[pos].quantity = next;
        Ok(Some(next))
    }

    /// Σ price × quantity
    pub fn total_price(&self) -> Result<Decimal, MoneyError> {
        subtotal_of(&self.lines)
    }

    /// Σ quantity
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.quantity))
    }

    pub fn get(&self, menu_item_id: i64) -> Option<&OrderItem> {
        self.lines.iter().find(|l| l.id == menu_item_id)
    }

    pub fn lines(&self) -> &[OrderItem] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu_item(id: i64, name: &str, price: &str) -> MenuItem {
        MenuItem {
            id,
            name: name.to_string(),
            price: price.parse().unwrap(),
            category: "Drinks".to_string(),
            available: true,
        }
    }

    #[test]
    fn test_same_item_twice_is_one_line() {
        let mojito = menu_item(1, "Mojito", "9.50");
        let mut cart = Cart::new();
        cart.add(&mojito).unwrap();
        assert_eq!(cart.add(&mojito), Ok(2));

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get(1).unwrap().quantity, 2);
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_decrement_last_unit_removes_line() {
        let mut cart = Cart::new();
        cart.add(&menu_item(1, "Mojito", "9.50")).unwrap();
        assert_eq!(cart.adjust_quantity(1, -1), Ok(None));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_adjust_quantity() {
        let mut cart = Cart::new();
        cart.add(&menu_item(1, "Mojito", "9.50")).unwrap();
        assert_eq!(cart.adjust_quantity(1, 3), Ok(Some(4)));
        assert_eq!(cart.adjust_quantity(1, -2), Ok(Some(2)));
        assert_eq!(cart.adjust_quantity(1, -10), Ok(None));
        assert_eq!(cart.adjust_quantity(99, 1), Ok(None));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_total_price() {
        let mut cart = Cart::new();
        assert_eq!(cart.total_price(), Ok(Decimal::ZERO));

        let mojito = menu_item(1, "Mojito", "9.50");
        cart.add(&mojito).unwrap();
        cart.add(&mojito).unwrap();
        cart.add(&menu_item(2, "Nachos", "7.25")).unwrap();
        assert_eq!(cart.total_price(), Ok("26.25".parse::<Decimal>().unwrap()));
    }

    #[test]
    fn test_snapshot_is_independent_of_menu_edits() {
        let mut mojito = menu_item(1, "Mojito", "9.50");
        let mut cart = Cart::new();
        cart.add(&mojito).unwrap();
        mojito.price = "12.00".parse().unwrap();
        mojito.name = "Mojito XL".to_string();

        let line = cart.get(1).unwrap();
        assert_eq!(line.name, "Mojito");
        assert_eq!(line.price, "9.50".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_remove_and_line_order() {
        let mut cart = Cart::new();
        cart.add(&menu_item(3, "C", "1")).unwrap();
        cart.add(&menu_item(1, "A", "1")).unwrap();
        cart.add(&menu_item(2, "B", "1")).unwrap();
        assert!(cart.remove(1));
        assert!(!cart.remove(1));
        let ids: Vec<_> = cart.lines().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn test_quantity_is_capped() {
        let mojito = menu_item(1, "Mojito", "9.50");
        let mut cart = Cart::new();
        cart.add(&mojito).unwrap();

        let limit = CartError::QuantityLimit {
            menu_item_id: 1,
            max: MAX_LINE_QUANTITY,
        };
        assert_eq!(cart.adjust_quantity(1, i32::MAX), Err(limit.clone()));
        assert_eq!(cart.get(1).unwrap().quantity, 1);

        assert_eq!(cart.adjust_quantity(1, 98), Ok(Some(MAX_LINE_QUANTITY)));
        assert_eq!(cart.add(&mojito), Err(limit));
        assert_eq!(cart.get(1).unwrap().quantity, MAX_LINE_QUANTITY);

        cart.add(&menu_item(2, "Nachos", "7.25")).unwrap();
        assert!(cart.adjust_quantity(2, i32::MAX).is_err());
        assert_eq!(cart.item_count(), MAX_LINE_QUANTITY + 1);
    }

    #[test]
    fn test_quantity_limit_maps_to_out_of_range() {
        let err: AppError = CartError::QuantityLimit {
            menu_item_id: 1,
            max: MAX_LINE_QUANTITY,
        }
        .into();
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
        assert_eq!(err.details.unwrap().get("field").unwrap(), "quantity");
    }
}

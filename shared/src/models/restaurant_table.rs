//! Restaurant Table Model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Table occupancy status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    #[default]
    Available,
    Booked,
    Occupied,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Booked => "booked",
            Self::Occupied => "occupied",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "booked" => Ok(Self::Booked),
            "occupied" => Ok(Self::Occupied),
            other => Err(format!("unknown table status: {other}")),
        }
    }
}

/// Restaurant table entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantTable {
    pub id: i64,
    /// Customer-facing number, unique and positive
    pub table_number: i32,
    pub status: TableStatus,
    /// Receipt code of the active order linked to this table
    pub current_order_id: Option<String>,
}

impl RestaurantTable {
    /// Clear the occupancy link
    pub fn release(&mut self) {
        self.status = TableStatus::Available;
        self.current_order_id = None;
    }

    /// Link an order to this table and mark it booked
    pub fn book_for(&mut self, receipt_id: impl Into<String>) {
        self.status = TableStatus::Booked;
        self.current_order_id = Some(receipt_id.into());
    }
}

/// Number for a newly added table: `max(existing) + 1`, or 1 when empty.
///
/// Gaps left by removed tables are not refilled.
pub fn next_table_number(tables: &[RestaurantTable]) -> i32 {
    tables
        .iter()
        .map(|t| t.table_number)
        .max()
        .map_or(1, |max| max + 1)
}

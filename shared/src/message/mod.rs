//! 变更事件类型定义
//!
//! 存储层每次写入都会发布一个 [`ChangeEvent`]，服务端订阅者与
//! SSE 客户端共享这些类型。事件只携带"哪张表、什么变化、哪一行"，
//! 消费方收到后重新拉取数据（fetch-and-replace）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// 可订阅的存储表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreTable {
    Orders,
    MenuItems,
    RestaurantTables,
}

impl StoreTable {
    pub const ALL: [StoreTable; 3] = [Self::Orders, Self::MenuItems, Self::RestaurantTables];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::MenuItems => "menu_items",
            Self::RestaurantTables => "restaurant_tables",
        }
    }
}

impl fmt::Display for StoreTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 订阅掩码：选择关心的变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventMask(u8);

impl EventMask {
    pub const INSERT: EventMask = EventMask(0b001);
    pub const UPDATE: EventMask = EventMask(0b010);
    pub const DELETE: EventMask = EventMask(0b100);
    pub const ALL: EventMask = EventMask(0b111);

    pub fn contains(&self, kind: ChangeKind) -> bool {
        let bit = match kind {
            ChangeKind::Insert => Self::INSERT.0,
            ChangeKind::Update => Self::UPDATE.0,
            ChangeKind::Delete => Self::DELETE.0,
        };
        self.0 & bit != 0
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        EventMask(self.0 | rhs.0)
    }
}

/// 一次存储写入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: StoreTable,
    pub kind: ChangeKind,
    /// 受影响行的 id
    pub id: i64,
    /// 每张表单调递增的版本号
    pub version: u64,
    /// Unix millis
    pub at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_contains() {
        let mask = EventMask::INSERT | EventMask::DELETE;
        assert!(mask.contains(ChangeKind::Insert));
        assert!(!mask.contains(ChangeKind::Update));
        assert!(mask.contains(ChangeKind::Delete));

        for kind in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
            assert!(EventMask::ALL.contains(kind));
        }
    }

    #[test]
    fn test_event_wire_format() {
        let event = ChangeEvent {
            table: StoreTable::RestaurantTables,
            kind: ChangeKind::Update,
            id: 3,
            version: 12,
            at: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["table"], "restaurant_tables");
        assert_eq!(json["kind"], "update");
    }
}

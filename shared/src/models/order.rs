//! Order Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order lifecycle status
///
/// Legal sequence: `pending → confirmed → preparing → served`, with `paid`
/// reachable from any non-cancelled status and `cancelled` from any non-paid
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Served,
    Paid,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::Served,
        Self::Paid,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Served => "served",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    /// Paid and cancelled orders no longer hold a table
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// Position on the kitchen track; terminal states have none
    fn kitchen_rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Preparing => Some(2),
            Self::Served => Some(3),
            Self::Paid | Self::Cancelled => None,
        }
    }

    /// Whether `self → target` is a legal lifecycle move.
    ///
    /// Setting the current status again is allowed (re-clicking is harmless).
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        if *self == target {
            return true;
        }
        match target {
            Self::Paid => *self != Self::Cancelled,
            Self::Cancelled => *self != Self::Paid,
            _ => match (self.kitchen_rank(), target.kitchen_rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

/// Payment method recorded on an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Online => "online",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "online" => Ok(Self::Online),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// Payment settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(Self::Unpaid),
            "paid" => Ok(Self::Paid),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// How the customer chose to settle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Pay later at the counter
    DirectCash,
    /// Paid inside the chat flow
    ChatbotPayment,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectCash => "direct_cash",
            Self::ChatbotPayment => "chatbot_payment",
        }
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct_cash" => Ok(Self::DirectCash),
            "chatbot_payment" => Ok(Self::ChatbotPayment),
            other => Err(format!("unknown payment type: {other}")),
        }
    }
}

/// Order line: point-in-time snapshot of a menu item plus quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Menu item reference
    pub id: i64,
    pub name: String,
    /// Price in currency unit at selection time
    pub price: Decimal,
    pub category: String,
    /// Always >= 1
    pub quantity: u32,
}

impl OrderItem {
    /// price × quantity; `None` on overflow
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// Customer/staff-facing receipt code (`NX-XXXXXX`)
    pub receipt_id: String,
    pub table_number: i32,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub tip_amount: Decimal,
    /// Always `subtotal + tip_amount`
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub payment_type: Option<PaymentType>,
    pub transaction_id: Option<String>,
    /// Unix millis
    pub created_at: i64,
    /// Unix millis
    pub updated_at: i64,
}

impl Order {
    /// Neither paid nor cancelled
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Total number of units across all lines
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, i| acc.saturating_add(i.quantity))
    }
}

/// Insert payload: an order before the store assigns its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub receipt_id: String,
    pub table_number: i32,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub tip_amount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub payment_type: Option<PaymentType>,
    pub transaction_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl OrderDraft {
    /// Attach the store-assigned id
    pub fn into_order(self, id: i64) -> Order {
        Order {
            id,
            receipt_id: self.receipt_id,
            table_number: self.table_number,
            items: self.items,
            subtotal: self.subtotal,
            tip_amount: self.tip_amount,
            total: self.total,
            status: self.status,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            payment_type: self.payment_type,
            transaction_id: self.transaction_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn test_kitchen_track_moves_forward_only() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(Served));
        assert!(Pending.can_transition_to(Served));
        assert!(!Served.can_transition_to(Preparing));
        assert!(!Confirmed.can_transition_to(Pending));
    }

    #[test]
    fn test_paid_and_cancelled_rules() {
        for status in [Pending, Confirmed, Preparing, Served] {
            assert!(status.can_transition_to(Paid));
            assert!(status.can_transition_to(Cancelled));
        }
        assert!(!Cancelled.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Paid.can_transition_to(Served));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_same_status_is_allowed() {
        for status in OrderStatus::ALL {
            assert!(status.can_transition_to(status));
        }
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&Preparing).unwrap();
        assert_eq!(json, "\"preparing\"");
        assert_eq!("cancelled".parse::<OrderStatus>(), Ok(Cancelled));
        assert!("void".parse::<OrderStatus>().is_err());

        let json = serde_json::to_string(&PaymentType::ChatbotPayment).unwrap();
        assert_eq!(json, "\"chatbot_payment\"");
    }

    #[test]
    fn test_line_total() {
        let item = OrderItem {
            id: 1,
            name: "Mojito".to_string(),
            price: "9.50".parse().unwrap(),
            category: "Drinks".to_string(),
            quantity: 2,
        };
        assert_eq!(item.line_total(), Some("19.00".parse::<Decimal>().unwrap()));
    }
}

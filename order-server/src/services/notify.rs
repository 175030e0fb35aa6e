//! 员工通知
//!
//! 新订单提交后发送一条摘要。尽力而为：失败只记录日志，不重试，不影响订单。

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use shared::models::Order;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification rejected with status {0}")]
    Rejected(u16),
}

/// 员工通知通道
#[async_trait]
pub trait StaffNotifier: Send + Sync {
    async fn notify(&self, order: &Order) -> Result<(), NotifyError>;
}

/// 订单摘要文本
///
/// ```text
/// New order NX-ABC234 at table 3
/// 2x Mojito
/// 1x Burger
/// Total: 31.50 (pay later)
/// ```
pub fn format_order_summary(order: &Order) -> String {
    let mut lines = vec![format!(
        "New order {} at table {}",
        order.receipt_id, order.table_number
    )];
    lines.extend(
        order
            .items
            .iter()
            .map(|item| format!("{}x {}", item.quantity, item.name)),
    );
    let settlement = match order.payment_type {
        Some(shared::models::PaymentType::ChatbotPayment) => "paid in chat",
        _ => "pay later",
    };
    lines.push(format!("Total: {:.2} ({settlement})", order.total));
    lines.join("\n")
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: String,
    receipt_id: &'a str,
    table_number: i32,
    order: &'a Order,
}

/// JSON webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl StaffNotifier for WebhookNotifier {
    async fn notify(&self, order: &Order) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            text: format_order_summary(order),
            receipt_id: &order.receipt_id,
            table_number: order.table_number,
            order,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        tracing::debug!(receipt_id = %order.receipt_id, "staff webhook delivered");
        Ok(())
    }
}

/// 未配置 webhook 时只写日志
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl StaffNotifier for LogNotifier {
    async fn notify(&self, order: &Order) -> Result<(), NotifyError> {
        tracing::info!(
            receipt_id = %order.receipt_id,
            table = order.table_number,
            summary = %format_order_summary(order),
            "New order"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::models::{OrderItem, OrderStatus, PaymentStatus, PaymentType};

    fn order(payment_type: PaymentType) -> Order {
        Order {
            id: 1,
            receipt_id: "NX-ABC234".into(),
            table_number: 3,
            items: vec![
                OrderItem {
                    id: 1,
                    name: "Mojito".into(),
                    price: "9.50".parse().unwrap(),
                    category: "Drinks".into(),
                    quantity: 2,
                },
                OrderItem {
                    id: 2,
                    name: "Burger".into(),
                    price: "12.50".parse().unwrap(),
                    category: "Mains".into(),
                    quantity: 1,
                },
            ],
            subtotal: "31.50".parse().unwrap(),
            tip_amount: Decimal::ZERO,
            total: "31.50".parse().unwrap(),
            status: OrderStatus::Pending,
            payment_method: None,
            payment_status: PaymentStatus::Unpaid,
            payment_type: Some(payment_type),
            transaction_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_summary_lists_lines_and_total() {
        let summary = format_order_summary(&order(PaymentType::DirectCash));
        assert_eq!(
            summary,
            "New order NX-ABC234 at table 3\n2x Mojito\n1x Burger\nTotal: 31.50 (pay later)"
        );
    }

    #[test]
    fn test_summary_marks_chat_payment() {
        let summary = format_order_summary(&order(PaymentType::ChatbotPayment));
        assert!(summary.ends_with("(paid in chat)"));
    }

    #[tokio::test]
    async fn test_unreachable_webhook_reports_transport_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", Duration::from_millis(200));
        let result = notifier.notify(&order(PaymentType::DirectCash)).await;
        assert!(matches!(result, Err(NotifyError::Transport(_))));
    }
}

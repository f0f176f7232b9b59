use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Order identifiers are fixed-width alphanumeric tokens as printed on
/// confirmation emails.
pub const ORDER_ID_LEN: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn parse(value: &str) -> Result<OrderId, DomainError> {
        let trimmed = value.trim();
        if trimmed.len() != ORDER_ID_LEN {
            return Err(DomainError::InvalidOrderId(format!(
                "expected {ORDER_ID_LEN} characters, got {}",
                trimmed.len()
            )));
        }
        if !trimmed.bytes().all(|byte| byte.is_ascii_alphanumeric()) {
            return Err(DomainError::InvalidOrderId(
                "only ASCII letters and digits are allowed".to_owned(),
            ));
        }
        Ok(OrderId(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pulls the first order-id-shaped token out of a free-form message.
///
/// A message that is exactly an order id wins outright; otherwise the first
/// run of `ORDER_ID_LEN` consecutive alphanumeric characters is taken, even
/// when embedded in surrounding prose or punctuation.
pub fn extract_order_id(message: &str) -> Option<OrderId> {
    let trimmed = message.trim();
    if let Ok(id) = OrderId::parse(trimmed) {
        return Some(id);
    }

    let bytes = trimmed.as_bytes();
    let mut run_start = 0;
    let mut run_len = 0;
    for (index, byte) in bytes.iter().enumerate() {
        if byte.is_ascii_alphanumeric() {
            if run_len == 0 {
                run_start = index;
            }
            run_len += 1;
            if run_len == ORDER_ID_LEN {
                // Runs are pure ASCII, so byte offsets are char boundaries.
                return Some(OrderId(trimmed[run_start..run_start + ORDER_ID_LEN].to_owned()));
            }
        } else {
            run_len = 0;
        }
    }
    None
}

/// Customer-facing description for a raw order status value.
pub fn status_description(status: &str) -> String {
    let described = match status {
        "created" => {
            "Your order has been created but not yet processed. Payment is being verified."
        }
        "approved" => {
            "Your payment has been approved and your order is being prepared for shipping."
        }
        "processing" => "Your order is currently being processed in our warehouse.",
        "shipped" => "Your order has been shipped and is on its way to you.",
        "delivered" => "Your order has been delivered to the specified address.",
        "canceled" => "Your order has been canceled.",
        "unavailable" => "Some items in your order are currently unavailable.",
        "invoiced" => "Your order has been invoiced and is being prepared for shipping.",
        other => return format!("Status: {other}"),
    };
    described.to_owned()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_id: Option<String>,
    pub status: String,
    pub purchased_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub estimated_delivery_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    /// Multi-line status report shown to the customer. Date lines appear
    /// only when the underlying milestone has been reached.
    pub fn summary(&self) -> String {
        let mut lines =
            vec![format!("Order ID: {}", self.id), status_description(&self.status)];
        if let Some(purchased_at) = self.purchased_at {
            lines.push(format!("Purchased on: {}", purchased_at.format("%Y-%m-%d %H:%M")));
        }
        if let Some(estimated_delivery_at) = self.estimated_delivery_at {
            lines.push(format!(
                "Estimated Delivery: {}",
                estimated_delivery_at.format("%Y-%m-%d")
            ));
        }
        if let Some(delivered_at) = self.delivered_at {
            lines.push(format!("Delivered on: {}", delivered_at.format("%Y-%m-%d %H:%M")));
        }
        lines.join("\n")
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cafeops_core::{CustomerId, DomainError, MenuItemId, OrderId};

/// Order status lifecycle. Fulfillment only ever creates `Open` orders;
/// closing happens elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Closed => "closed",
        }
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(OrderStatus::Open),
            "closed" => Ok(OrderStatus::Closed),
            other => Err(DomainError::validation(format!("unknown order status '{other}'"))),
        }
    }
}

/// How an order is paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }
}

impl core::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            other => Err(DomainError::validation(format!(
                "payment method must be one of: cash, card (got '{other}')"
            ))),
        }
    }
}

/// Order header as handed to the order ledger (id not yet assigned).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
}

/// Persisted order header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order line: menu item, quantity, and the price that applied when the order
/// was fulfilled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub menu_item_id: MenuItemId,
    pub quantity: i64,
    pub price_at_order: f64,
}

impl OrderLine {
    pub fn extended_price(&self) -> f64 {
        self.price_at_order * self.quantity as f64
    }
}

/// An order header together with its lines, as read back from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

impl OrderReceipt {
    /// Sum of the lines' extended prices.
    pub fn lines_total(&self) -> f64 {
        self.lines.iter().map(OrderLine::extended_price).sum()
    }
}

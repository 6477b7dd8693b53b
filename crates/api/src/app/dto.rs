use serde::{Deserialize, Serialize};

use cafeops_orders::{Order, OrderLine, OrderReceipt, ProposedOrder};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct BatchProcessRequest {
    pub orders: Vec<ProposedOrder>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct OrderReceiptResponse {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
}

impl From<OrderReceipt> for OrderReceiptResponse {
    fn from(receipt: OrderReceipt) -> Self {
        Self {
            order: receipt.order,
            items: receipt.lines,
        }
    }
}

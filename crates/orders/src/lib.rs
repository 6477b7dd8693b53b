//! Orders domain module.
//!
//! Persisted order headers and lines, plus the transient `ProposedOrder`
//! shape a batch request carries before fulfillment.

pub mod order;
pub mod proposed;

pub use order::{NewOrder, Order, OrderLine, OrderReceipt, OrderStatus, PaymentMethod};
pub use proposed::{ProposedLine, ProposedOrder};

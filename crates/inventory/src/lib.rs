//! Inventory domain module.
//!
//! Stock levels per ingredient, the immutable transaction log entries written
//! when stock is consumed, and the requirement map an order builds before it
//! touches stock. Pure domain logic (no IO, no storage).

pub mod requirements;
pub mod stock;

pub use requirements::{IngredientRequirements, Shortfall};
pub use stock::{
    DecrementOutcome, InventoryRecord, InventoryTransaction, STOCK_TOLERANCE, TransactionType,
    tolerance_for,
};

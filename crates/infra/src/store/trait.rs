use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use cafeops_catalog::MenuItem;
use cafeops_core::{CustomerId, IngredientId, MenuItemId, OrderId};
use cafeops_customers::CustomerName;
use cafeops_inventory::{DecrementOutcome, InventoryTransaction};
use cafeops_orders::{NewOrder, Order, OrderLine};

/// Storage operation error.
///
/// These are **infrastructure errors** (connectivity, SQL failures, constraint
/// violations) as opposed to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached (pool closed, connection lost).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A statement failed for a reason not covered below.
    #[error("query failed: {0}")]
    Query(String),

    /// A uniqueness / foreign-key / check constraint rejected a write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// A stored row could not be turned back into a domain value.
    #[error("failed to decode row: {0}")]
    Decode(String),
}

/// Read-only lookups of menu items.
#[async_trait]
pub trait CatalogReader: Send {
    /// Price and recipe of a menu item, `None` when the id is unknown.
    async fn menu_item(&mut self, id: &MenuItemId) -> Result<Option<MenuItem>, StoreError>;
}

/// Stock levels and the inventory transaction log.
#[async_trait]
pub trait InventoryLedger: Send {
    /// Current stock, `None` when the ingredient has no inventory row.
    async fn stock(&mut self, id: &IngredientId) -> Result<Option<f64>, StoreError>;

    /// Atomic check-and-set decrement.
    ///
    /// The floor check is evaluated against the row as seen by this unit at the
    /// moment of the write, never against an earlier read. A missing row
    /// reports `Insufficient { available: 0.0 }`.
    async fn decrement(
        &mut self,
        id: &IngredientId,
        amount: f64,
    ) -> Result<DecrementOutcome, StoreError>;

    /// Append an immutable transaction-log entry.
    async fn record_transaction(&mut self, entry: &InventoryTransaction) -> Result<(), StoreError>;
}

/// Order headers and lines.
#[async_trait]
pub trait OrderLedger: Send {
    /// Insert an order header and return its assigned id.
    async fn create_order(&mut self, order: &NewOrder) -> Result<OrderId, StoreError>;

    async fn add_line(&mut self, line: &OrderLine) -> Result<(), StoreError>;

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Lines of an order in insertion order.
    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>, StoreError>;
}

/// Name → id resolution for customers.
#[async_trait]
pub trait CustomerDirectory: Send {
    /// Idempotent upsert: the same name always yields the same id.
    async fn resolve_or_create(&mut self, name: &CustomerName) -> Result<CustomerId, StoreError>;
}

/// One atomic unit of work.
///
/// Every ledger/directory call made through a unit is part of the same atomic
/// scope. Dropping a unit without calling `commit` discards its writes.
#[async_trait]
pub trait UnitOfWork:
    CatalogReader + InventoryLedger + OrderLedger + CustomerDirectory + Sized
{
    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Transactional scope provider: opens units of work.
#[async_trait]
pub trait UnitProvider: Send + Sync {
    type Unit: UnitOfWork;

    async fn begin(&self) -> Result<Self::Unit, StoreError>;
}

#[async_trait]
impl<P> UnitProvider for Arc<P>
where
    P: UnitProvider,
{
    type Unit = P::Unit;

    async fn begin(&self) -> Result<Self::Unit, StoreError> {
        (**self).begin().await
    }
}

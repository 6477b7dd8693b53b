//! Fulfillment engine: one proposed order in, one committed order (or a
//! rejection) out.
//!
//! The engine never opens, commits or rolls back a unit of work itself. The
//! caller owns the unit and decides its fate from the returned `Result`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, Span};

use cafeops_core::{CustomerId, IngredientId, MenuItemId, OrderId};
use cafeops_customers::CustomerName;
use cafeops_inventory::{DecrementOutcome, IngredientRequirements, InventoryTransaction, Shortfall};
use cafeops_orders::{NewOrder, OrderLine, OrderStatus, PaymentMethod, ProposedOrder};

use crate::store::{StoreError, UnitOfWork};

/// Why a single order was not fulfilled.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The order failed structural checks.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("unknown menu item '{0}'")]
    UnknownMenuItem(MenuItemId),

    /// Stock could not cover the order, either at the feasibility check or
    /// because a concurrent order consumed it before the decrement.
    #[error("insufficient inventory: {0}")]
    InsufficientInventory(Shortfall),

    /// A catalog or stock read failed before any write was attempted.
    #[error("storage read failed: {0}")]
    ReadFailed(#[source] StoreError),

    #[error("fulfillment write failed: {0}")]
    WriteFailed(#[source] StoreError),
}

impl FulfillmentError {
    pub fn reason(&self) -> RejectionReason {
        match self {
            FulfillmentError::InvalidOrder(_) => RejectionReason::InvalidOrder,
            FulfillmentError::UnknownMenuItem(_) => RejectionReason::UnknownMenuItem,
            FulfillmentError::InsufficientInventory(_) => RejectionReason::InsufficientInventory,
            FulfillmentError::ReadFailed(_) => RejectionReason::StoreReadFailed,
            FulfillmentError::WriteFailed(_) => RejectionReason::FulfillmentWriteFailed,
        }
    }
}

/// A rejected order and the total it had been priced at when it was rejected.
///
/// The total covers every line priced before the failure, so a plan-phase
/// rejection (unknown item, catalog read) carries a partial sum.
#[derive(Debug)]
pub struct Rejection {
    pub error: FulfillmentError,
    pub total: f64,
}

impl Rejection {
    pub fn reason(&self) -> RejectionReason {
        self.error.reason()
    }
}

impl FulfillmentError {
    fn priced_at(self, total: f64) -> Rejection {
        Rejection { error: self, total }
    }
}

/// Machine-readable rejection reason reported per order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    InvalidOrder,
    UnknownMenuItem,
    InsufficientInventory,
    StoreReadFailed,
    FulfillmentWriteFailed,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::InvalidOrder => "invalid_order",
            RejectionReason::UnknownMenuItem => "unknown_menu_item",
            RejectionReason::InsufficientInventory => "insufficient_inventory",
            RejectionReason::StoreReadFailed => "store_read_failed",
            RejectionReason::FulfillmentWriteFailed => "fulfillment_write_failed",
        }
    }
}

impl core::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock movement caused by a fulfilled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockChange {
    pub ingredient_id: IngredientId,
    pub quantity_used: f64,
    pub remaining_stock: f64,
}

/// A fulfilled (not yet committed) order.
#[derive(Debug, Clone, PartialEq)]
pub struct Fulfillment {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub total: f64,
    /// One entry per ingredient consumed, ascending by ingredient id.
    pub stock_changes: Vec<StockChange>,
}

#[derive(Debug)]
struct PlannedLine {
    menu_item_id: MenuItemId,
    quantity: i64,
    price: f64,
}

/// Everything the write phase needs, computed from reads only.
#[derive(Debug)]
struct Plan {
    customer: CustomerName,
    lines: Vec<PlannedLine>,
    requirements: IngredientRequirements,
    total: f64,
}

/// Turns one proposed order into persisted rows inside a caller-owned unit.
#[derive(Debug, Clone, Default)]
pub struct FulfillmentEngine {
    payment_method: PaymentMethod,
}

impl FulfillmentEngine {
    pub fn new(payment_method: PaymentMethod) -> Self {
        Self { payment_method }
    }

    /// Fulfill `order` against `unit`.
    ///
    /// On `Err` the unit may hold partial writes; the caller must roll it back.
    /// The rejection still reports the total priced so far.
    #[instrument(
        skip(self, unit, order),
        fields(
            customer = %order.customer_name,
            lines = order.items.len(),
            order_id = tracing::field::Empty,
            total = tracing::field::Empty
        )
    )]
    pub async fn fulfill<U: UnitOfWork>(
        &self,
        unit: &mut U,
        order: &ProposedOrder,
    ) -> Result<Fulfillment, Rejection> {
        let plan = self.plan(unit, order).await?;
        let total = plan.total;
        self.check_feasibility(unit, &plan.requirements)
            .await
            .map_err(|e| e.priced_at(total))?;
        let fulfillment = self.write(unit, plan).await.map_err(|e| e.priced_at(total))?;

        let span = Span::current();
        span.record("order_id", fulfillment.order_id.get());
        span.record("total", fulfillment.total);
        Ok(fulfillment)
    }

    async fn plan<U: UnitOfWork>(
        &self,
        unit: &mut U,
        order: &ProposedOrder,
    ) -> Result<Plan, Rejection> {
        order
            .validate()
            .map_err(|e| FulfillmentError::InvalidOrder(e.to_string()).priced_at(0.0))?;
        let customer = CustomerName::parse(&order.customer_name)
            .map_err(|e| FulfillmentError::InvalidOrder(e.to_string()).priced_at(0.0))?;

        let mut lines = Vec::with_capacity(order.items.len());
        let mut requirements = IngredientRequirements::new();
        let mut total = 0.0;

        for line in &order.items {
            let item = unit
                .menu_item(&line.menu_item_id)
                .await
                .map_err(|e| FulfillmentError::ReadFailed(e).priced_at(total))?
                .ok_or_else(|| {
                    FulfillmentError::UnknownMenuItem(line.menu_item_id.clone()).priced_at(total)
                })?;

            for (ingredient_id, quantity) in item.recipe.scaled(line.quantity as f64) {
                requirements.add(ingredient_id, quantity);
            }
            total += item.line_total(line.quantity);
            lines.push(PlannedLine {
                menu_item_id: item.id,
                quantity: line.quantity,
                price: item.price,
            });
        }

        debug!(ingredients = requirements.len(), total, "order planned");
        Ok(Plan {
            customer,
            lines,
            requirements,
            total,
        })
    }

    async fn check_feasibility<U: UnitOfWork>(
        &self,
        unit: &mut U,
        requirements: &IngredientRequirements,
    ) -> Result<(), FulfillmentError> {
        for (ingredient_id, required) in requirements.iter() {
            let available = unit
                .stock(ingredient_id)
                .await
                .map_err(FulfillmentError::ReadFailed)?
                .unwrap_or(0.0);
            if let Some(shortfall) = Shortfall::check(ingredient_id, required, available) {
                return Err(FulfillmentError::InsufficientInventory(shortfall));
            }
        }
        Ok(())
    }

    async fn write<U: UnitOfWork>(
        &self,
        unit: &mut U,
        plan: Plan,
    ) -> Result<Fulfillment, FulfillmentError> {
        let customer_id = unit
            .resolve_or_create(&plan.customer)
            .await
            .map_err(FulfillmentError::WriteFailed)?;

        let order_id = unit
            .create_order(&NewOrder {
                customer_id,
                total_amount: plan.total,
                status: OrderStatus::Open,
                payment_method: self.payment_method,
            })
            .await
            .map_err(FulfillmentError::WriteFailed)?;

        for line in plan.lines {
            unit.add_line(&OrderLine {
                order_id,
                menu_item_id: line.menu_item_id,
                quantity: line.quantity,
                price_at_order: line.price,
            })
            .await
            .map_err(FulfillmentError::WriteFailed)?;
        }

        let mut stock_changes = Vec::with_capacity(plan.requirements.len());
        for (ingredient_id, required) in plan.requirements.iter() {
            let outcome = unit
                .decrement(ingredient_id, required)
                .await
                .map_err(FulfillmentError::WriteFailed)?;
            let remaining = match outcome {
                DecrementOutcome::Applied { remaining } => remaining,
                DecrementOutcome::Insufficient { available } => {
                    return Err(FulfillmentError::InsufficientInventory(Shortfall {
                        ingredient_id: ingredient_id.clone(),
                        required,
                        available,
                    }));
                }
            };

            unit.record_transaction(&InventoryTransaction::sale(ingredient_id.clone(), required))
                .await
                .map_err(FulfillmentError::WriteFailed)?;

            stock_changes.push(StockChange {
                ingredient_id: ingredient_id.clone(),
                quantity_used: required,
                remaining_stock: remaining,
            });
        }

        Ok(Fulfillment {
            order_id,
            customer_id,
            total: plan.total,
            stock_changes,
        })
    }
}

//! Batch coordinator.
//!
//! Every proposed order gets its own unit of work: begin, fulfill, then commit
//! on success or roll back on rejection. Rejections never leak into the next
//! order. Only a failure to begin or end a unit aborts the batch.
//!
//! Orders that fail structural checks are screened out before a unit is
//! opened. They still get a rejected result in their input position.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn, Span};

use cafeops_core::{BatchId, DomainError, IngredientId, OrderId};
use cafeops_orders::{OrderReceipt, ProposedOrder};

use super::engine::{Fulfillment, FulfillmentEngine, Rejection, RejectionReason, StockChange};
use crate::store::{OrderLedger, StoreError, UnitOfWork, UnitProvider};

/// Batch-level failure. No partial report is returned.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A unit of work could not be opened or closed.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Accepted,
    Rejected,
}

/// Outcome of one proposed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub customer_name: String,
    pub status: BatchStatus,
    /// Priced total. For a rejected order this is what it was priced at when
    /// rejected (zero when it never reached pricing) and is not revenue.
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatchResult {
    fn accepted(customer_name: &str, fulfillment: &Fulfillment) -> Self {
        Self {
            customer_name: customer_name.to_string(),
            status: BatchStatus::Accepted,
            total: fulfillment.total,
            order_id: Some(fulfillment.order_id),
            reason: None,
            message: None,
        }
    }

    fn rejected(customer_name: &str, rejection: &Rejection) -> Self {
        Self {
            customer_name: customer_name.to_string(),
            status: BatchStatus::Rejected,
            total: rejection.total,
            order_id: None,
            reason: Some(rejection.reason()),
            message: Some(rejection.error.to_string()),
        }
    }

    fn screened(customer_name: &str, violation: &DomainError) -> Self {
        Self {
            customer_name: customer_name.to_string(),
            status: BatchStatus::Rejected,
            total: 0.0,
            order_id: None,
            reason: Some(RejectionReason::InvalidOrder),
            message: Some(violation.to_string()),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == BatchStatus::Accepted
    }
}

/// Net stock movement of one ingredient across the accepted orders of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub ingredient_id: IngredientId,
    pub quantity_used: f64,
    /// Stock level after the last accepted order that used the ingredient.
    pub remaining_stock: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_orders: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub total_revenue: f64,
    /// Sorted by ingredient id.
    pub inventory_updates: Vec<InventoryUpdate>,
}

impl BatchSummary {
    fn record_accepted(&mut self, fulfillment: &Fulfillment) {
        self.total_orders += 1;
        self.accepted += 1;
        self.total_revenue += fulfillment.total;
        for change in &fulfillment.stock_changes {
            self.merge(change);
        }
    }

    fn record_rejected(&mut self) {
        self.total_orders += 1;
        self.rejected += 1;
    }

    fn merge(&mut self, change: &StockChange) {
        match self
            .inventory_updates
            .binary_search_by(|u| u.ingredient_id.cmp(&change.ingredient_id))
        {
            Ok(idx) => {
                let update = &mut self.inventory_updates[idx];
                update.quantity_used += change.quantity_used;
                update.remaining_stock = change.remaining_stock;
            }
            Err(idx) => self.inventory_updates.insert(
                idx,
                InventoryUpdate {
                    ingredient_id: change.ingredient_id.clone(),
                    quantity_used: change.quantity_used,
                    remaining_stock: change.remaining_stock,
                },
            ),
        }
    }
}

/// Everything a batch call returns: one result per proposed order, in input
/// order, plus the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: BatchId,
    pub processed_orders: Vec<BatchResult>,
    pub summary: BatchSummary,
}

/// Final state of one order's unit of work.
enum Outcome {
    Committed(Fulfillment),
    RolledBack(Rejection),
}

/// Drives a batch of proposed orders through the engine.
#[derive(Debug, Clone)]
pub struct BatchCoordinator<P> {
    provider: P,
    engine: FulfillmentEngine,
}

impl<P> BatchCoordinator<P>
where
    P: UnitProvider,
{
    pub fn new(provider: P, engine: FulfillmentEngine) -> Self {
        Self { provider, engine }
    }

    /// Screen, then fulfill each order in input order.
    #[instrument(
        skip(self, orders),
        fields(
            batch_id = tracing::field::Empty,
            orders = orders.len(),
            accepted = tracing::field::Empty,
            rejected = tracing::field::Empty
        ),
        err
    )]
    pub async fn process_batch(&self, orders: Vec<ProposedOrder>) -> Result<BatchReport, BatchError> {
        let batch_id = BatchId::new();
        let span = Span::current();
        span.record("batch_id", tracing::field::display(batch_id));

        let mut processed_orders = Vec::with_capacity(orders.len());
        let mut summary = BatchSummary::default();

        for (index, order) in orders.iter().enumerate() {
            if let Err(violation) = order.validate() {
                warn!(index, error = %violation, "order screened out");
                summary.record_rejected();
                processed_orders.push(BatchResult::screened(&order.customer_name, &violation));
                continue;
            }

            match self.settle(order).await? {
                Outcome::Committed(fulfillment) => {
                    info!(
                        index,
                        order_id = %fulfillment.order_id,
                        total = fulfillment.total,
                        "order accepted"
                    );
                    summary.record_accepted(&fulfillment);
                    processed_orders.push(BatchResult::accepted(&order.customer_name, &fulfillment));
                }
                Outcome::RolledBack(rejection) => {
                    warn!(
                        index,
                        reason = %rejection.reason(),
                        error = %rejection.error,
                        "order rejected"
                    );
                    summary.record_rejected();
                    processed_orders.push(BatchResult::rejected(&order.customer_name, &rejection));
                }
            }
        }

        span.record("accepted", summary.accepted);
        span.record("rejected", summary.rejected);
        Ok(BatchReport {
            batch_id,
            processed_orders,
            summary,
        })
    }

    /// Run one order in a fresh unit and close the unit according to the result.
    async fn settle(&self, order: &ProposedOrder) -> Result<Outcome, BatchError> {
        let mut unit = self.provider.begin().await?;
        match self.engine.fulfill(&mut unit, order).await {
            Ok(fulfillment) => {
                unit.commit().await?;
                Ok(Outcome::Committed(fulfillment))
            }
            Err(rejection) => {
                unit.rollback().await?;
                Ok(Outcome::RolledBack(rejection))
            }
        }
    }

    /// Read back a committed order with its lines.
    #[instrument(skip(self), fields(order_id = %id), err)]
    pub async fn order_receipt(&self, id: OrderId) -> Result<Option<OrderReceipt>, StoreError> {
        let mut unit = self.provider.begin().await?;
        let receipt = match unit.order(id).await? {
            Some(order) => {
                let lines = unit.order_lines(id).await?;
                Some(OrderReceipt { order, lines })
            }
            None => None,
        };
        unit.rollback().await?;
        Ok(receipt)
    }
}

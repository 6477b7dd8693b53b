use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cafeops_core::{DomainError, DomainResult, IngredientId};

/// Current stock of one ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub ingredient_id: IngredientId,
    pub name: String,
    /// Quantity on hand, in `unit`. Never negative.
    pub stock: f64,
    pub unit: String,
    pub last_updated: DateTime<Utc>,
}

/// Result of a floor-checked decrement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecrementOutcome {
    /// Stock was reduced; `remaining` is the new level.
    Applied { remaining: f64 },
    /// Stock was left untouched because it could not cover the amount.
    Insufficient { available: f64 },
}

impl InventoryRecord {
    pub fn new(
        ingredient_id: IngredientId,
        name: impl Into<String>,
        stock: f64,
        unit: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !stock.is_finite() || stock < 0.0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        Ok(Self {
            ingredient_id,
            name: name.into(),
            stock,
            unit: unit.into(),
            last_updated: now,
        })
    }

    /// Whether current stock covers `required`. The boundary is inclusive.
    pub fn covers(&self, required: f64) -> bool {
        covers(self.stock, required)
    }

    /// Check-and-set decrement: reduces stock only if it stays at or above zero.
    /// A decrement that lands within [`STOCK_TOLERANCE`] below zero leaves 0.
    pub fn decrement(&mut self, amount: f64, now: DateTime<Utc>) -> DecrementOutcome {
        if !self.covers(amount) {
            return DecrementOutcome::Insufficient {
                available: self.stock,
            };
        }
        self.stock = (self.stock - amount).max(0.0);
        self.last_updated = now;
        DecrementOutcome::Applied {
            remaining: self.stock,
        }
    }
}

/// Relative slack allowed when comparing a computed requirement against stock.
///
/// Requirements are built by multiplying and summing `f64` recipe quantities,
/// so `0.1 * 3.0` arrives as `0.30000000000000004`. Anything within this
/// fraction of the requirement (or of 1.0 for requirements below one unit)
/// counts as an exact match.
pub const STOCK_TOLERANCE: f64 = 1e-9;

/// Absolute slack for a requirement of `required`.
pub fn tolerance_for(required: f64) -> f64 {
    STOCK_TOLERANCE * required.abs().max(1.0)
}

/// Inclusive feasibility test shared by the in-memory ledger, the engine and
/// the Postgres decrement predicate.
pub fn covers(available: f64, required: f64) -> bool {
    required <= available + tolerance_for(required)
}

/// Kind of stock movement recorded in the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Sale,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
        }
    }
}

impl core::str::FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(TransactionType::Sale),
            other => Err(DomainError::validation(format!(
                "unknown inventory transaction type '{other}'"
            ))),
        }
    }
}

/// Immutable audit record of one stock movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub ingredient_id: IngredientId,
    /// Signed change; negative when stock was consumed.
    pub change_amount: f64,
    pub transaction_type: TransactionType,
}

impl InventoryTransaction {
    /// Log entry for `quantity` consumed by a sale.
    pub fn sale(ingredient_id: IngredientId, quantity: f64) -> Self {
        Self {
            ingredient_id,
            change_amount: -quantity,
            transaction_type: TransactionType::Sale,
        }
    }
}

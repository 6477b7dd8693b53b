//! Proposed orders: the transient input of a batch request.

use serde::{Deserialize, Serialize};

use cafeops_core::{DomainError, DomainResult, MenuItemId};

/// One requested line: a menu item and how many of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedLine {
    pub menu_item_id: MenuItemId,
    pub quantity: i64,
}

/// A customer's proposed order, not yet checked against inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedOrder {
    pub customer_name: String,
    pub items: Vec<ProposedLine>,
}

impl ProposedOrder {
    pub fn new(customer_name: impl Into<String>) -> Self {
        Self {
            customer_name: customer_name.into(),
            items: Vec::new(),
        }
    }

    pub fn line(mut self, menu_item_id: MenuItemId, quantity: i64) -> Self {
        self.items.push(ProposedLine {
            menu_item_id,
            quantity,
        });
        self
    }

    /// Structural checks that need no storage access.
    pub fn validate(&self) -> DomainResult<()> {
        if self.customer_name.trim().is_empty() {
            return Err(DomainError::validation("customer_name cannot be empty"));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        for (idx, line) in self.items.iter().enumerate() {
            if line.menu_item_id.as_str().trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "items[{idx}]: menu_item_id cannot be empty"
                )));
            }
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "items[{idx}]: quantity must be positive (got {})",
                    line.quantity
                )));
            }
        }
        Ok(())
    }
}

//! Batch order fulfillment.

pub mod batch;
pub mod engine;

pub use batch::{
    BatchCoordinator, BatchError, BatchReport, BatchResult, BatchStatus, BatchSummary,
    InventoryUpdate,
};
pub use engine::{
    Fulfillment, FulfillmentEngine, FulfillmentError, Rejection, RejectionReason, StockChange,
};

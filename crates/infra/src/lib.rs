//! Infrastructure layer: storage adapters and the fulfillment pipeline that
//! runs on top of them.

pub mod fulfillment;
pub mod store;

mod integration_tests;

pub use fulfillment::{BatchCoordinator, BatchError, BatchReport, FulfillmentEngine};
pub use store::{InMemoryStore, PostgresStore, StoreError, UnitProvider};

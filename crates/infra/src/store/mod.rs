//! Relational storage boundary.
//!
//! The fulfillment engine talks to storage only through a unit of work
//! ([`UnitOfWork`]) opened by a [`UnitProvider`]. Two adapters exist: an
//! in-memory one for tests/dev and a Postgres one.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{FailPoint, InMemoryStore, InMemoryUnit};
pub use postgres::{PostgresStore, PostgresUnit};
pub use r#trait::{
    CatalogReader, CustomerDirectory, InventoryLedger, OrderLedger, StoreError, UnitOfWork,
    UnitProvider,
};

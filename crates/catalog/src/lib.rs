//! Catalog domain module.
//!
//! Menu items, their prices and their recipes. The catalog is read-only from
//! the point of view of order fulfillment.

pub mod menu;

pub use menu::{MenuItem, Recipe};

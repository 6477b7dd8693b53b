//! Customer directory domain module.

pub mod customer;

pub use customer::{Customer, CustomerName};

//! Errors raised by the pure domain crates.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failure of a domain constructor or check.
///
/// Catalog, inventory and order values raise `Validation`; id parsing raises
/// `InvalidId`. Storage failures are infra errors and never appear here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A price, quantity, name or proposed order was rejected.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A menu item, ingredient, customer or order id could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The catalog entry being changed does not exist.
    #[error("not found")]
    NotFound,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
